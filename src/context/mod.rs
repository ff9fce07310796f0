//! Context assemblers: best-effort augmentations gathered before dispatch.

pub mod scrape;
pub mod search;

pub use scrape::PageScraper;
pub use search::WebSearchClient;

use crate::types::Attachment;
use crate::Error;

/// Resolves a host media id to attachment bytes. Injected by the host;
/// the crate never touches the media library directly.
#[async_trait::async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn load(&self, media_id: u64) -> Result<Attachment, Error>;
}
