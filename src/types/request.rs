use serde::{Deserialize, Serialize};

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// Model-authored turns. Callers historically sent `ai` or `model`
    /// for these, so both spellings deserialize to this variant.
    #[serde(alias = "ai", alias = "model")]
    Assistant,
}

/// Generation mode, selecting instruction framing and endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Text,
    Code,
    Image,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Text
    }
}

/// One message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    /// Create a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Create an assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// A single image riding along with the prompt, for vision-capable calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl Attachment {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }
}

/// The canonical unit of work sent into the gateway. Adapters re-express
/// it in their vendor's wire format; it is never mutated or persisted.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub history: Vec<ConversationTurn>,
    pub model: Option<String>,
    pub attachment: Option<Attachment>,
    pub mode: Mode,
    pub json_mode: bool,
}

impl GenerationRequest {
    /// Create a text-mode request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Set the conversation history preceding the prompt.
    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    /// Set an explicit model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Attach an image to the final user turn.
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Set the generation mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Request structured JSON output where the vendor supports it.
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    /// The requested model identifier, with empty strings treated as unset.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref().filter(|model| !model.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder_defaults() {
        let request = GenerationRequest::new("Hello");
        assert_eq!(request.prompt, "Hello");
        assert!(request.history.is_empty());
        assert_eq!(request.mode, Mode::Text);
        assert!(!request.json_mode);
        assert!(request.attachment.is_none());
        assert_eq!(request.model(), None);
    }

    #[test]
    fn test_empty_model_counts_as_unset() {
        let request = GenerationRequest::new("Hello").with_model("");
        assert_eq!(request.model(), None);

        let request = GenerationRequest::new("Hello").with_model("gemini-1.5-pro");
        assert_eq!(request.model(), Some("gemini-1.5-pro"));
    }

    #[test]
    fn test_role_accepts_legacy_spellings() {
        let turn: ConversationTurn = serde_json::from_str(r#"{"role":"ai","text":"hi"}"#).unwrap();
        assert_eq!(turn.role, Role::Assistant);

        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role":"model","text":"hi"}"#).unwrap();
        assert_eq!(turn.role, Role::Assistant);

        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role":"user","text":"hi"}"#).unwrap();
        assert_eq!(turn.role, Role::User);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let result = serde_json::from_str::<ConversationTurn>(r#"{"role":"system","text":"hi"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_mode_deserializes_lowercase() {
        assert_eq!(serde_json::from_str::<Mode>(r#""text""#).unwrap(), Mode::Text);
        assert_eq!(serde_json::from_str::<Mode>(r#""code""#).unwrap(), Mode::Code);
        assert_eq!(serde_json::from_str::<Mode>(r#""image""#).unwrap(), Mode::Image);
    }
}
