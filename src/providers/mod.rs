//! Provider implementations for different LLM services.

pub mod gemini;
pub mod openai;

// Re-export commonly used provider types
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;

/// The standard vendor error envelope, `{"error": {"message": ...}}`.
/// Both vendors use this shape, on error statuses and sometimes inside
/// 200 responses.
#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    message: String,
}

/// Extract the vendor's error message from a response body, if the body
/// carries the standard envelope.
pub(crate) fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .map(|error| error.message)
}

/// A short, char-boundary-safe excerpt of a response body for error
/// reporting. Vendor error pages can be arbitrarily large HTML.
pub(crate) fn excerpt(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    match body.char_indices().nth(MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_from_envelope() {
        let body = r#"{"error": {"message": "quota exceeded", "code": 429}}"#;
        assert_eq!(error_message(body), Some("quota exceeded".to_string()));
    }

    #[test]
    fn test_error_message_absent() {
        assert_eq!(error_message(r#"{"ok": true}"#), None);
        assert_eq!(error_message("<html>Bad Gateway</html>"), None);
        assert_eq!(error_message(""), None);
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        let short = "tiny body";
        assert_eq!(excerpt(short), short);

        let long = "é".repeat(300);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }
}
