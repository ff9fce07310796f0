//! Web search augmentation via the Google Custom Search API.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::providers::{error_message, excerpt};
use crate::Error;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/customsearch/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RESULTS: usize = 4;

/// Fetches web search results and formats them as a plain-text context
/// block. Failures here are soft at the service level; this client just
/// reports them.
pub struct WebSearchClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: String,
    snippet: Option<String>,
}

impl WebSearchClient {
    /// Create a client against the public Custom Search endpoint.
    pub fn new() -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    /// Create a client with a custom endpoint (for testing).
    pub fn with_base_url(base_url: String) -> Result<Self, Error> {
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Run a search and format the top results as `- title: snippet`
    /// lines, one per result.
    pub async fn search(
        &self,
        query: &str,
        api_key: &str,
        engine_id: &str,
    ) -> Result<String, Error> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("key", api_key), ("cx", engine_id), ("q", query)])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            if let Some(message) = error_message(&body) {
                return Err(Error::upstream_api("web search", message));
            }
            return Err(Error::UpstreamHttp {
                provider: "web search".to_string(),
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let decoded: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| Error::malformed("web search", format!("invalid JSON body: {e}")))?;

        Ok(format_results(&decoded.items))
    }
}

fn format_results(items: &[SearchItem]) -> String {
    if items.is_empty() {
        return "No results.".to_string();
    }
    items
        .iter()
        .take(MAX_RESULTS)
        .map(|item| {
            let snippet = item.snippet.as_deref().unwrap_or("");
            format!("- {}: {}", item.title, snippet)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
