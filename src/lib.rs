//! A unified gateway over LLM vendors for content generation.
//!
//! This library normalizes the Google Gemini and OpenAI APIs behind one
//! canonical contract: text, code, and image generation, multi-turn
//! history, image attachments, blocking and streaming calls. The
//! [`GenerationService`] orchestrates a full caller request (credential
//! resolution, web-search and page-scrape augmentation, prompt framing);
//! the [`Gateway`] underneath is a pure router over the provider
//! adapters. Streaming responses decode each vendor's own wire format
//! into one canonical delta stream, re-encodable as caller-facing SSE
//! frames via [`sse_frames::encode`].

pub mod context;
pub mod error;
pub mod gateway;
pub mod json_stream;
pub mod provider;
pub mod providers;
pub mod service;
pub mod sse_frames;
pub mod sse_stream;
pub mod types;

pub use context::{AttachmentStore, PageScraper, WebSearchClient};
pub use error::Error;
pub use gateway::{Gateway, ProviderId};
pub use provider::LLMProvider;
pub use providers::{GeminiProvider, OpenAIProvider};
pub use service::{CredentialStore, GenerateParams, GenerationService};
pub use types::*;
