use thiserror::Error;

/// Errors that can occur when using the quillgate library.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown provider: {0}")]
    InvalidProvider(String),

    #[error("missing API credential")]
    MissingCredential,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{provider} returned HTTP {status}: {body}")]
    UpstreamHttp {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} API error: {message}")]
    UpstreamApi { provider: String, message: String },

    #[error("malformed {provider} response: {detail}")]
    MalformedResponse { provider: String, detail: String },

    #[error("{provider} does not support {capability}")]
    NotImplemented {
        provider: String,
        capability: String,
    },

    #[error("streaming error: {0}")]
    Streaming(String),
}

impl Error {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Error::InvalidRequest(message.into())
    }

    pub fn upstream_api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::UpstreamApi {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn malformed(provider: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::MalformedResponse {
            provider: provider.into(),
            detail: detail.into(),
        }
    }

    pub fn not_implemented(provider: impl Into<String>, capability: impl Into<String>) -> Self {
        Error::NotImplemented {
            provider: provider.into(),
            capability: capability.into(),
        }
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Error::Streaming(message.into())
    }
}
