use serde::{Deserialize, Serialize};

/// Gemini generateContent request format.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// Gemini content (message) format.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: String, // "user", "model"
    pub parts: Vec<Part>,
}

/// Part of a Gemini content.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

/// Inline binary data (attachments) carried base64-encoded.
#[derive(Debug, Clone, Serialize)]
pub struct InlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

/// Gemini generation configuration.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

/// Gemini generateContent response. Streamed array elements share this
/// shape, one candidate delta per element.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub error: Option<ApiError>,
}

/// Gemini response candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

/// Content of a response candidate.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

/// Part of a response candidate. Non-text parts deserialize with no text.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidatePart {
    pub text: Option<String>,
}

/// Vendor error body, also embedded in some 200 responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub message: String,
}

/// Imagen predict request format.
#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest {
    pub instances: Vec<PredictInstance>,
    pub parameters: PredictParameters,
}

/// A single prompt instance for image prediction.
#[derive(Debug, Clone, Serialize)]
pub struct PredictInstance {
    pub prompt: String,
}

/// Imagen prediction parameters.
#[derive(Debug, Clone, Serialize)]
pub struct PredictParameters {
    #[serde(rename = "sampleCount")]
    pub sample_count: u32,
}

/// Imagen predict response.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    pub error: Option<ApiError>,
}

/// A single predicted image, base64-encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    #[serde(rename = "bytesBase64Encoded")]
    pub bytes_base64_encoded: Option<String>,
}

/// Gemini models listing response.
#[derive(Debug, Clone, Deserialize)]
pub struct ListModelsResponse {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
    pub error: Option<ApiError>,
}

/// One model in the vendor listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub name: String, // "models/gemini-1.5-flash"
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "supportedGenerationMethods")]
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}
