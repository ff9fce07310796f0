//! Provider selection and dispatch.

use std::str::FromStr;

use crate::provider::LLMProvider;
use crate::providers::{GeminiProvider, OpenAIProvider};
use crate::types::{Generated, GenerationRequest, Mode, ModelInfo, TextStream};
use crate::Error;

/// The closed set of supported providers. Unknown identifiers are a hard
/// error; there is no fallback provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderId {
    Gemini,
    OpenAi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Gemini => "gemini",
            ProviderId::OpenAi => "openai",
        }
    }
}

impl FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderId::Gemini),
            // Long-standing callers send "chatgpt" for the OpenAI provider.
            "openai" | "chatgpt" => Ok(ProviderId::OpenAi),
            _ => Err(Error::InvalidProvider(s.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routes canonical requests to the adapter named by the provider id.
///
/// The gateway is a pure router: it validates the inputs that can be
/// checked without a network call, picks the adapter, and forwards the
/// request. It never retries and never rewrites adapter errors.
pub struct Gateway {
    gemini: GeminiProvider,
    openai: OpenAIProvider,
}

impl Gateway {
    /// Create a gateway against the production vendor endpoints.
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            gemini: GeminiProvider::new()?,
            openai: OpenAIProvider::new()?,
        })
    }

    /// Create a gateway from pre-built adapters (for custom base URLs).
    pub fn with_providers(gemini: GeminiProvider, openai: OpenAIProvider) -> Self {
        Self { gemini, openai }
    }

    fn provider(&self, id: ProviderId) -> &dyn LLMProvider {
        match id {
            ProviderId::Gemini => &self.gemini,
            ProviderId::OpenAi => &self.openai,
        }
    }

    /// Checks that need no network round trip, run before any dispatch.
    fn validate(request: &GenerationRequest, api_key: &str) -> Result<(), Error> {
        if api_key.is_empty() {
            return Err(Error::MissingCredential);
        }
        if request.prompt.trim().is_empty() {
            return Err(Error::invalid_request("prompt must not be empty"));
        }
        Ok(())
    }

    /// Execute a blocking generation: text for text/code modes, an image
    /// for image mode.
    pub async fn dispatch(
        &self,
        provider_id: &str,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<Generated, Error> {
        let id = ProviderId::from_str(provider_id)?;
        Self::validate(request, api_key)?;

        tracing::debug!(provider = %id, mode = ?request.mode, "dispatching generation");
        let provider = self.provider(id);
        match request.mode {
            Mode::Text | Mode::Code => provider
                .generate_text(request, api_key)
                .await
                .map(Generated::Text),
            Mode::Image => provider
                .generate_image(request, api_key)
                .await
                .map(Generated::Image),
        }
    }

    /// Execute a streaming text generation. Image mode has no streaming
    /// endpoint on either vendor.
    pub async fn dispatch_stream(
        &self,
        provider_id: &str,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<TextStream, Error> {
        let id = ProviderId::from_str(provider_id)?;
        Self::validate(request, api_key)?;

        let provider = self.provider(id);
        if request.mode == Mode::Image {
            return Err(Error::not_implemented(
                provider.name(),
                "streaming image generation",
            ));
        }

        tracing::debug!(provider = %id, "dispatching streaming generation");
        provider.generate_text_stream(request, api_key).await
    }

    /// List the models the named provider offers.
    pub async fn list_models(
        &self,
        provider_id: &str,
        api_key: &str,
    ) -> Result<Vec<ModelInfo>, Error> {
        let id = ProviderId::from_str(provider_id)?;
        if api_key.is_empty() {
            return Err(Error::MissingCredential);
        }
        self.provider(id).list_models(api_key).await
    }
}
