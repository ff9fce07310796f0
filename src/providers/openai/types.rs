use serde::{Deserialize, Serialize};

/// OpenAI chat completions request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// One chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String, // "system", "user", "assistant"
    pub content: MessageContent,
}

/// Message content, plain text or a list of typed blocks.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A typed content block for multimodal messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

/// An image reference; attachments travel as data URIs.
#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Structured output selector.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    pub r#type: String, // "json_object"
}

/// OpenAI chat completions response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub error: Option<ApiError>,
}

/// One response choice.
#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: Option<ChoiceMessage>,
}

/// The message of a response choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

/// One SSE chunk of a streamed chat completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// One choice within a streamed chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    pub delta: Option<ChunkDelta>,
}

/// The incremental delta of a streamed choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkDelta {
    pub content: Option<String>,
}

/// Image generations request.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub n: u32,
    pub size: String,
    pub response_format: String, // "b64_json"
}

/// Image generations response.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageResponse {
    #[serde(default)]
    pub data: Vec<ImageDatum>,
    pub error: Option<ApiError>,
}

/// One generated image, base64-encoded.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageDatum {
    pub b64_json: Option<String>,
}

/// Vendor error body, also embedded in some 200 responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub message: String,
}
