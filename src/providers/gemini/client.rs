use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::StreamExt;
use reqwest::Client;
use std::time::Duration;

use super::types::*;
use crate::json_stream::JsonArrayStream;
use crate::provider::LLMProvider;
use crate::providers::{error_message, excerpt};
use crate::types::streaming::DeltaFrame;
use crate::types::{
    GenerationRequest, GenerationResult, ImageResult, ModelInfo, ModelKind, Role, TextStream,
};
use crate::Error;

const PROVIDER: &str = "Gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-001";
const IMAGE_MODEL_FAMILY: &str = "imagen";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Gemini provider implementation via the Generative Language API.
///
/// Text generation uses `generateContent` and its streamed variant,
/// which transmits a top-level JSON array incrementally. Image
/// generation goes through the Imagen `predict` endpoint.
pub struct GeminiProvider {
    client: Client,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider against the public API endpoint.
    pub fn new() -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    /// Create a new Gemini provider with a custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Result<Self, Error> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build the endpoint for a model method. This API carries the key
    /// as a query parameter, not a header.
    fn endpoint(&self, model: &str, method: &str, api_key: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.base_url, model, method, api_key
        )
    }

    fn text_model<'a>(&self, request: &'a GenerationRequest) -> &'a str {
        request.model().unwrap_or(DEFAULT_TEXT_MODEL)
    }

    /// Image requests must name a model from the image family; anything
    /// else falls back to the default so a chat model id never reaches
    /// the predict endpoint.
    fn image_model<'a>(&self, request: &'a GenerationRequest) -> &'a str {
        match request.model() {
            Some(model) if model.contains(IMAGE_MODEL_FAMILY) => model,
            _ => DEFAULT_IMAGE_MODEL,
        }
    }

    /// Convert a canonical request to the generateContent wire shape.
    fn convert_request(&self, request: &GenerationRequest) -> GenerateContentRequest {
        let mut contents: Vec<Content> = request
            .history
            .iter()
            .map(|turn| Content {
                role: role_name(turn.role).to_string(),
                parts: vec![Part::Text {
                    text: turn.text.clone(),
                }],
            })
            .collect();

        // The current prompt is the final user turn; an attachment part
        // precedes its text part.
        let mut parts = vec![Part::Text {
            text: request.prompt.clone(),
        }];
        if let Some(attachment) = &request.attachment {
            parts.insert(
                0,
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: attachment.mime_type.clone(),
                        data: BASE64.encode(&attachment.data),
                    },
                },
            );
        }
        contents.push(Content {
            role: "user".to_string(),
            parts,
        });

        let generation_config = request.json_mode.then(|| GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
        });

        GenerateContentRequest {
            contents,
            generation_config,
        }
    }

    /// Pull the text of the first candidate's first part, the slot used
    /// by both blocking responses and stream elements.
    fn extract_text(response: GenerateContentResponse) -> Option<String> {
        response
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }

    /// Map a non-success response to the vendor's own message when the
    /// body carries the standard envelope.
    fn upstream_error(status: reqwest::StatusCode, body: String) -> Error {
        if let Some(message) = error_message(&body) {
            return Error::upstream_api(PROVIDER, message);
        }
        Error::UpstreamHttp {
            provider: PROVIDER.to_string(),
            status: status.as_u16(),
            body: excerpt(&body),
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<String, Error> {
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(body);
        }
        Err(Self::upstream_error(status, body))
    }
}

#[async_trait::async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate_text(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<GenerationResult, Error> {
        let model = self.text_model(request);
        let body = self.convert_request(request);

        let response = self
            .client
            .post(self.endpoint(model, "generateContent", api_key))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let mut decoded: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| Error::malformed(PROVIDER, format!("invalid JSON body: {e}")))?;

        // Some failures arrive inside a 200 body.
        if let Some(error) = decoded.error.take() {
            return Err(Error::upstream_api(PROVIDER, error.message));
        }

        match Self::extract_text(decoded) {
            Some(text) => Ok(GenerationResult { text }),
            None => Err(Error::malformed(PROVIDER, "no candidate text in response")),
        }
    }

    async fn generate_text_stream(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<TextStream, Error> {
        let model = self.text_model(request);
        let body = self.convert_request(request);

        let response = self
            .client
            .post(self.endpoint(model, "streamGenerateContent", api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            return Err(Self::upstream_error(status, body));
        }

        let frames = JsonArrayStream::new(response.bytes_stream()).map(|element| {
            let element = element?;
            match serde_json::from_str::<GenerateContentResponse>(&element) {
                Ok(mut chunk) => {
                    if let Some(error) = chunk.error.take() {
                        return Err(Error::upstream_api(PROVIDER, error.message));
                    }
                    match Self::extract_text(chunk) {
                        Some(text) if !text.is_empty() => Ok(DeltaFrame::Text(text)),
                        _ => Ok(DeltaFrame::Ignored),
                    }
                }
                Err(e) => {
                    // An undecodable element is skipped, not fatal.
                    tracing::warn!(error = %e, "skipping undecodable stream element");
                    Ok(DeltaFrame::Ignored)
                }
            }
        });

        Ok(TextStream::from_frames(frames))
    }

    async fn generate_image(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<ImageResult, Error> {
        let model = self.image_model(request);
        let body = PredictRequest {
            instances: vec![PredictInstance {
                prompt: request.prompt.clone(),
            }],
            parameters: PredictParameters { sample_count: 1 },
        };

        let response = self
            .client
            .post(self.endpoint(model, "predict", api_key))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let mut decoded: PredictResponse = serde_json::from_str(&body)
            .map_err(|e| Error::malformed(PROVIDER, format!("invalid JSON body: {e}")))?;

        if let Some(error) = decoded.error.take() {
            return Err(Error::upstream_api(PROVIDER, error.message));
        }

        let encoded = decoded
            .predictions
            .into_iter()
            .next()
            .and_then(|prediction| prediction.bytes_base64_encoded)
            .ok_or_else(|| Error::malformed(PROVIDER, "no image data in response"))?;

        let data = BASE64
            .decode(encoded)
            .map_err(|e| Error::malformed(PROVIDER, format!("invalid base64 image data: {e}")))?;

        Ok(ImageResult {
            data,
            mime_type: "image/png".to_string(),
        })
    }

    async fn list_models(&self, api_key: &str) -> Result<Vec<ModelInfo>, Error> {
        let response = self
            .client
            .get(format!("{}/models?key={}", self.base_url, api_key))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let mut decoded: ListModelsResponse = serde_json::from_str(&body)
            .map_err(|e| Error::malformed(PROVIDER, format!("invalid JSON body: {e}")))?;

        if let Some(error) = decoded.error.take() {
            return Err(Error::upstream_api(PROVIDER, error.message));
        }

        Ok(decoded
            .models
            .into_iter()
            .filter_map(classify_model)
            .collect())
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Classify a vendor listing entry, keeping only generation models.
/// Embedding and other auxiliary models support neither method.
fn classify_model(entry: ModelEntry) -> Option<ModelInfo> {
    let id = entry
        .name
        .strip_prefix("models/")
        .unwrap_or(&entry.name)
        .to_string();

    let methods = &entry.supported_generation_methods;
    let kind = if methods.iter().any(|m| m == "predict" || m == "generateImage")
        || id.contains(IMAGE_MODEL_FAMILY)
    {
        ModelKind::Image
    } else if methods.iter().any(|m| m == "generateContent") {
        ModelKind::Text
    } else {
        return None;
    };

    let name = entry.display_name.unwrap_or_else(|| id.clone());
    Some(ModelInfo { id, name, kind })
}
