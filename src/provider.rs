use crate::types::{GenerationRequest, GenerationResult, ImageResult, ModelInfo, TextStream};
use crate::Error;

/// A trait for LLM vendor adapters that fulfil canonical generation
/// requests. Every adapter takes the caller's API key per call; adapters
/// hold no credentials of their own.
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync + 'static {
    /// A short, human-readable vendor name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Generate a complete text response in one round trip.
    async fn generate_text(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<GenerationResult, Error>;

    /// Generate text as an incremental delta stream.
    async fn generate_text_stream(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<TextStream, Error>;

    /// Generate a single image from a text prompt. Adapters for vendors
    /// without an image endpoint inherit this refusal.
    async fn generate_image(
        &self,
        request: &GenerationRequest,
        api_key: &str,
    ) -> Result<ImageResult, Error> {
        let _ = (request, api_key);
        Err(Error::not_implemented(self.name(), "image generation"))
    }

    /// List the models this vendor offers, classified by capability.
    async fn list_models(&self, api_key: &str) -> Result<Vec<ModelInfo>, Error>;
}
