use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::StreamExt;
use reqwest::Client;
use std::time::Duration;

use super::types::*;
use crate::provider::LLMProvider;
use crate::providers::{error_message, excerpt};
use crate::sse_stream::SseStream;
use crate::types::streaming::DeltaFrame;
use crate::types::{
    Attachment, GenerationRequest, GenerationResult, ImageResult, ModelInfo, ModelKind, Role,
    TextStream,
};
use crate::Error;

const PROVIDER: &str = "OpenAI";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TEXT_MODEL: &str = "gpt-4o";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const IMAGE_MODEL_FAMILY: &str = "dall-e";
const SYSTEM_PROMPT: &str = "You are a helpful writing assistant.";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The vendor listing endpoint returns every model family unfiltered,
/// so this host offers a curated set of chat and image models instead.
const CURATED_MODELS: &[(&str, &str, ModelKind)] = &[
    ("gpt-4o", "GPT-4o", ModelKind::Text),
    ("gpt-4o-mini", "GPT-4o mini", ModelKind::Text),
    ("gpt-4-turbo", "GPT-4 Turbo", ModelKind::Text),
    ("gpt-3.5-turbo", "GPT-3.5 Turbo", ModelKind::Text),
    ("dall-e-3", "DALL-E 3", ModelKind::Image),
    ("dall-e-2", "DALL-E 2", ModelKind::Image),
];

/// OpenAI provider implementation via the chat completions API.
///
/// Streamed responses arrive as SSE `data:` events terminated by a
/// literal `[DONE]` payload. Image generation goes through the separate
/// images endpoint.
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider against the public API endpoint.
    pub fn new() -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    /// Create a new OpenAI provider with a custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Result<Self, Error> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn text_model<'a>(&self, request: &'a GenerationRequest) -> &'a str {
        request.model().unwrap_or(DEFAULT_TEXT_MODEL)
    }

    /// Image requests must name a model from the image family; anything
    /// else falls back to the default so a chat model id never reaches
    /// the images endpoint.
    fn image_model<'a>(&self, request: &'a GenerationRequest) -> &'a str {
        match request.model() {
            Some(model) if model.contains(IMAGE_MODEL_FAMILY) => model,
            _ => DEFAULT_IMAGE_MODEL,
        }
    }

    /// Convert a canonical request to the chat completions wire shape.
    /// The system turn always leads, then history, then the prompt as
    /// the final user turn.
    fn convert_request(&self, request: &GenerationRequest, stream: bool) -> ChatRequest {
        let mut messages = vec![ChatMessage {
            role: "system".to_string(),
            content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
        }];

        messages.extend(request.history.iter().map(|turn| ChatMessage {
            role: role_name(turn.role).to_string(),
            content: MessageContent::Text(turn.text.clone()),
        }));

        // An attachment upgrades the final turn to content blocks, text
        // first, image second.
        let content = match &request.attachment {
            Some(attachment) => MessageContent::Blocks(vec![
                ContentBlock::Text {
                    text: request.prompt.clone(),
                },
                ContentBlock::ImageUrl {
                    image_url: ImageUrl {
                        url: data_uri(attachment),
                    },
                },
            ]),
            None => MessageContent::Text(request.prompt.clone()),
        };
        messages.push(ChatMessage {
            role: "user".to_string(),
            content,
        });

        let response_format = request.json_mode.then(|| ResponseFormat {
            r#type: "json_object".to_string(),
        });

        ChatRequest {
            model: self.text_model(request).to_string(),
            messages,
            response_format,
            stream: stream.then_some(true),
        }
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
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate_text(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<GenerationResult, Error> {
        let body = self.convert_request(request, false);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let mut decoded: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| Error::malformed(PROVIDER, format!("invalid JSON body: {e}")))?;

        // Some failures arrive inside a 200 body.
        if let Some(error) = decoded.error.take() {
            return Err(Error::upstream_api(PROVIDER, error.message));
        }

        let text = decoded
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content);

        match text {
            Some(text) => Ok(GenerationResult { text }),
            None => Err(Error::malformed(PROVIDER, "no choice content in response")),
        }
    }

    async fn generate_text_stream(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<TextStream, Error> {
        let body = self.convert_request(request, true);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            return Err(Self::upstream_error(status, body));
        }

        let frames = SseStream::new(response.bytes_stream()).map(|payload| {
            let payload = payload?;
            if payload.trim() == "[DONE]" {
                return Ok(DeltaFrame::EndOfStream);
            }
            match serde_json::from_str::<ChatChunk>(&payload) {
                Ok(chunk) => {
                    let delta = chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.delta)
                        .and_then(|delta| delta.content);
                    match delta {
                        Some(text) if !text.is_empty() => Ok(DeltaFrame::Text(text)),
                        _ => Ok(DeltaFrame::Ignored),
                    }
                }
                Err(e) => {
                    // An undecodable event is skipped, not fatal.
                    tracing::warn!(error = %e, "skipping undecodable stream event");
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
        let body = ImageRequest {
            model: self.image_model(request).to_string(),
            prompt: request.prompt.clone(),
            n: 1,
            size: "1024x1024".to_string(),
            response_format: "b64_json".to_string(),
        };

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let mut decoded: ImageResponse = serde_json::from_str(&body)
            .map_err(|e| Error::malformed(PROVIDER, format!("invalid JSON body: {e}")))?;

        if let Some(error) = decoded.error.take() {
            return Err(Error::upstream_api(PROVIDER, error.message));
        }

        let encoded = decoded
            .data
            .into_iter()
            .next()
            .and_then(|datum| datum.b64_json)
            .ok_or_else(|| Error::malformed(PROVIDER, "no image data in response"))?;

        let data = BASE64
            .decode(encoded)
            .map_err(|e| Error::malformed(PROVIDER, format!("invalid base64 image data: {e}")))?;

        Ok(ImageResult {
            data,
            mime_type: "image/png".to_string(),
        })
    }

    async fn list_models(&self, _api_key: &str) -> Result<Vec<ModelInfo>, Error> {
        Ok(CURATED_MODELS
            .iter()
            .map(|(id, name, kind)| ModelInfo {
                id: (*id).to_string(),
                name: (*name).to_string(),
                kind: *kind,
            })
            .collect())
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn data_uri(attachment: &Attachment) -> String {
    format!(
        "data:{};base64,{}",
        attachment.mime_type,
        BASE64.encode(&attachment.data)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConversationTurn, Mode};

    fn provider() -> OpenAIProvider {
        OpenAIProvider::new().unwrap()
    }

    #[test]
    fn test_provider_creation() {
        let provider = OpenAIProvider::with_base_url("http://localhost:9999/".to_string()).unwrap();
        assert_eq!(provider.base_url, "http://localhost:9999");
    }

    #[test]
    fn test_system_turn_leads_conversation() {
        let request = GenerationRequest::new("And now?").with_history(vec![
            ConversationTurn::user("Hi"),
            ConversationTurn::assistant("Hello!"),
        ]);

        let body = serde_json::to_value(provider().convert_request(&request, false)).unwrap();
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], SYSTEM_PROMPT);
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["role"], "user");
        assert_eq!(messages[3]["content"], "And now?");
        assert!(body.get("stream").is_none());
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_attachment_becomes_content_blocks() {
        let request = GenerationRequest::new("Describe this")
            .with_attachment(Attachment::new(vec![1, 2, 3], "image/jpeg"));

        let body = serde_json::to_value(provider().convert_request(&request, false)).unwrap();
        let content = body["messages"][1]["content"].as_array().unwrap();

        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "Describe this");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(
            content[1]["image_url"]["url"],
            "data:image/jpeg;base64,AQID"
        );
    }

    #[test]
    fn test_json_mode_sets_response_format() {
        let request = GenerationRequest::new("Give me JSON").with_json_mode(true);

        let body = serde_json::to_value(provider().convert_request(&request, false)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_streaming_flag() {
        let request = GenerationRequest::new("hi");

        let body = serde_json::to_value(provider().convert_request(&request, true)).unwrap();
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_text_model_defaulting() {
        let provider = provider();

        assert_eq!(provider.text_model(&GenerationRequest::new("hi")), "gpt-4o");
        assert_eq!(
            provider.text_model(&GenerationRequest::new("hi").with_model("gpt-4-turbo")),
            "gpt-4-turbo"
        );
    }

    #[test]
    fn test_image_model_requires_image_family() {
        let provider = provider();

        let request = GenerationRequest::new("a cat")
            .with_mode(Mode::Image)
            .with_model("gpt-4o");
        assert_eq!(provider.image_model(&request), "dall-e-3");

        let request = GenerationRequest::new("a cat")
            .with_mode(Mode::Image)
            .with_model("dall-e-2");
        assert_eq!(provider.image_model(&request), "dall-e-2");
    }

    #[tokio::test]
    async fn test_curated_model_listing() {
        let models = provider().list_models("unused").await.unwrap();

        assert!(models.iter().any(|m| m.id == "gpt-4o" && m.kind == ModelKind::Text));
        assert!(models.iter().any(|m| m.id == "dall-e-3" && m.kind == ModelKind::Image));
    }
}
