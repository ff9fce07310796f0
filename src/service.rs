//! End-to-end orchestration of one caller request: credentials, context
//! assembly, prompt composition, dispatch.

use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::context::{AttachmentStore, PageScraper, WebSearchClient};
use crate::gateway::Gateway;
use crate::types::{ConversationTurn, Generated, GenerationRequest, Mode, ModelInfo, TextStream};
use crate::Error;

/// Credential store key for the provider API key.
const AI_KEY: &str = "ai_api_key";
/// Credential store keys for the web search augmentation.
const SEARCH_KEY: &str = "search_api_key";
const SEARCH_ENGINE_ID: &str = "search_engine_id";

const CODE_INSTRUCTION: &str =
    "You are an expert developer. Provide ONLY the code requested, with no explanations.";
const TEXT_INSTRUCTION: &str =
    "Format the response in clean Markdown (## for H2, ### for H3, ** for bold, - for lists).";

/// Resolves per-user secrets. The host decrypts; this crate only ever
/// sees plaintext keys, and never caches them.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn decrypted_key(&self, user_id: u64, name: &str) -> Option<String>;
}

/// The caller-facing request body, in the host's camelCase JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateParams {
    pub prompt: String,
    pub model: Option<String>,
    pub mode: Mode,
    pub history: Vec<ConversationTurn>,
    pub use_memory: bool,
    pub use_web_search: bool,
    pub ref_url: Option<String>,
    pub attachment_id: Option<u64>,
    pub json_mode: bool,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            model: None,
            mode: Mode::Text,
            history: Vec::new(),
            // Callers that omit the flag keep their history.
            use_memory: true,
            use_web_search: false,
            ref_url: None,
            attachment_id: None,
            json_mode: false,
        }
    }
}

/// Orchestrates one generation request end to end. Holds no per-request
/// state; safe to share across concurrent requests.
pub struct GenerationService {
    gateway: Gateway,
    search: WebSearchClient,
    scraper: PageScraper,
    credentials: Arc<dyn CredentialStore>,
    attachments: Arc<dyn AttachmentStore>,
}

impl GenerationService {
    pub fn new(
        gateway: Gateway,
        search: WebSearchClient,
        scraper: PageScraper,
        credentials: Arc<dyn CredentialStore>,
        attachments: Arc<dyn AttachmentStore>,
    ) -> Self {
        Self {
            gateway,
            search,
            scraper,
            credentials,
            attachments,
        }
    }

    /// Run a blocking generation for one caller request.
    pub async fn generate(
        &self,
        user_id: u64,
        provider_id: &str,
        params: GenerateParams,
    ) -> Result<Generated, Error> {
        let request_id = Uuid::new_v4();
        tracing::debug!(%request_id, provider = provider_id, "handling generation request");
        validate_prompt(&params)?;
        let api_key = self.ai_key(user_id).await?;
        let request = self.build_request(user_id, params, request_id).await;
        self.gateway.dispatch(provider_id, &request, &api_key).await
    }

    /// Run a streaming generation for one caller request. Image mode has
    /// no streaming path and is rejected by the gateway.
    pub async fn generate_stream(
        &self,
        user_id: u64,
        provider_id: &str,
        params: GenerateParams,
    ) -> Result<TextStream, Error> {
        let request_id = Uuid::new_v4();
        tracing::debug!(%request_id, provider = provider_id, "handling streaming request");
        validate_prompt(&params)?;
        let api_key = self.ai_key(user_id).await?;
        let request = self.build_request(user_id, params, request_id).await;
        self.gateway
            .dispatch_stream(provider_id, &request, &api_key)
            .await
    }

    /// List the named provider's models for a caller.
    pub async fn list_models(
        &self,
        user_id: u64,
        provider_id: &str,
    ) -> Result<Vec<ModelInfo>, Error> {
        let api_key = self.ai_key(user_id).await?;
        self.gateway.list_models(provider_id, &api_key).await
    }

    async fn ai_key(&self, user_id: u64) -> Result<String, Error> {
        self.credentials
            .decrypted_key(user_id, AI_KEY)
            .await
            .filter(|key| !key.is_empty())
            .ok_or(Error::MissingCredential)
    }

    /// Assemble the canonical request: gate history on `use_memory`, run
    /// the augmentations, frame the prompt for the mode. Every
    /// augmentation is best-effort; a failure is logged and skipped.
    async fn build_request(
        &self,
        user_id: u64,
        params: GenerateParams,
        request_id: Uuid,
    ) -> GenerationRequest {
        let history = if params.use_memory {
            params.history
        } else {
            Vec::new()
        };

        // Image mode: the prompt is the image description, verbatim.
        if params.mode == Mode::Image {
            return GenerationRequest {
                prompt: params.prompt,
                history,
                model: params.model,
                attachment: None,
                mode: params.mode,
                json_mode: params.json_mode,
            };
        }

        let mut prompt = params.prompt;

        if params.use_web_search {
            if let Some(results) = self.web_search(user_id, &prompt, request_id).await {
                prompt.push_str("\n\n[WEB SEARCH RESULTS]:\n");
                prompt.push_str(&results);
            }
        }

        if let Some(url) = params.ref_url.as_deref().filter(|url| !url.is_empty()) {
            match self.scraper.scrape(url).await {
                Ok(text) => {
                    prompt.push_str("\n\n[REFERENCE URL CONTENT]:\n");
                    prompt.push_str(&text);
                }
                Err(e) => {
                    tracing::warn!(%request_id, url, error = %e, "page scrape failed; skipping");
                }
            }
        }

        let instruction = match params.mode {
            Mode::Code => CODE_INSTRUCTION,
            _ => TEXT_INSTRUCTION,
        };
        prompt.push_str("\n\n[INSTRUCTION]: ");
        prompt.push_str(instruction);

        let mut attachment = None;
        if let Some(media_id) = params.attachment_id {
            match self.attachments.load(media_id).await {
                Ok(loaded) => attachment = Some(loaded),
                Err(e) => {
                    tracing::warn!(%request_id, media_id, error = %e, "attachment load failed; skipping");
                }
            }
        }

        GenerationRequest {
            prompt,
            history,
            model: params.model,
            attachment,
            mode: params.mode,
            json_mode: params.json_mode,
        }
    }

    /// Resolve search credentials and run the search. `None` means the
    /// augmentation is skipped, whatever the reason.
    async fn web_search(&self, user_id: u64, query: &str, request_id: Uuid) -> Option<String> {
        let api_key = self.credentials.decrypted_key(user_id, SEARCH_KEY).await;
        let engine_id = self
            .credentials
            .decrypted_key(user_id, SEARCH_ENGINE_ID)
            .await;

        let (api_key, engine_id) = match (api_key, engine_id) {
            (Some(key), Some(id)) if !key.is_empty() && !id.is_empty() => (key, id),
            _ => {
                tracing::warn!(%request_id, "web search requested without search credentials; skipping");
                return None;
            }
        };

        match self.search.search(query, &api_key, &engine_id).await {
            Ok(results) => Some(results),
            Err(e) => {
                tracing::warn!(%request_id, error = %e, "web search failed; skipping");
                None
            }
        }
    }
}

fn validate_prompt(params: &GenerateParams) -> Result<(), Error> {
    if params.prompt.trim().is_empty() {
        return Err(Error::invalid_request("prompt must not be empty"));
    }
    Ok(())
}
