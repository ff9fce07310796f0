use serde::Serialize;

/// A complete text generation, either decoded from a blocking response or
/// reconstructed by concatenating stream deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub text: String,
}

/// A generated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResult {
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// The outcome of a blocking dispatch: text for text/code modes, an image
/// for image mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    Text(GenerationResult),
    Image(ImageResult),
}

impl Generated {
    /// The text result, if this is one.
    pub fn into_text(self) -> Option<GenerationResult> {
        match self {
            Generated::Text(result) => Some(result),
            Generated::Image(_) => None,
        }
    }

    /// The image result, if this is one.
    pub fn into_image(self) -> Option<ImageResult> {
        match self {
            Generated::Image(result) => Some(result),
            Generated::Text(_) => None,
        }
    }
}

/// What a listed model can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Text,
    Image,
}

/// One entry in a provider's model listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    /// Identifier to send back in `GenerationRequest::model`.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    pub kind: ModelKind,
}
