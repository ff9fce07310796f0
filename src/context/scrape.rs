//! Reference-URL augmentation: fetch a page and reduce it to plain text.

use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;

use crate::providers::excerpt;
use crate::Error;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound on bytes read from the page body.
const MAX_BODY_BYTES: usize = 1_048_576;
/// Upper bound on the extracted text, in characters.
const MAX_TEXT_CHARS: usize = 5000;

/// Fetches a caller-supplied URL and extracts readable text from its
/// HTML. Failures here are soft at the service level.
pub struct PageScraper {
    client: Client,
}

impl PageScraper {
    pub fn new() -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(format!("quillgate/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch a page and return its text content, truncated to a bounded
    /// length. Only `http`/`https` URLs are fetched.
    pub async fn scrape(&self, url: &str) -> Result<String, Error> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::invalid_request(format!("invalid reference URL: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(Error::invalid_request(format!(
                    "unsupported URL scheme: {scheme}"
                )));
            }
        }

        let response = self
            .client
            .get(parsed)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamHttp {
                provider: "page scrape".to_string(),
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let body = read_limited_body(response, MAX_BODY_BYTES).await?;
        let html = String::from_utf8_lossy(&body);

        let mut text = html_to_text(&html);
        truncate_at_char_boundary(&mut text, MAX_TEXT_CHARS);
        Ok(text)
    }
}

/// Read a response body up to a byte limit, discarding the rest.
async fn read_limited_body(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, Error> {
    let mut stream = response.bytes_stream();
    let mut body = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let remaining = limit.saturating_sub(body.len());
        if remaining == 0 {
            break;
        }
        let take = chunk.len().min(remaining);
        body.extend_from_slice(&chunk[..take]);
    }

    Ok(body)
}

/// Reduce HTML to readable text: script/style subtrees dropped, tags
/// stripped, common entities decoded, whitespace collapsed.
fn html_to_text(html: &str) -> String {
    let without_scripts = drop_subtrees(html, "script");
    let without_styles = drop_subtrees(&without_scripts, "style");
    let stripped = strip_tags(&without_styles);
    let decoded = decode_entities(&stripped);
    collapse_whitespace(&decoded)
}

/// Remove every `<tag …>…</tag>` subtree, case-insensitively. Content
/// inside these elements is code, not page text.
fn drop_subtrees(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}");

    let mut out = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = find_ignore_ascii_case(html, pos, &open) {
        out.push_str(&html[pos..start]);
        // A space where the element stood, so surrounding text does not
        // merge into one word.
        out.push(' ');

        // Skip to past the matching close tag; an unterminated element
        // swallows the rest of the document.
        pos = match find_ignore_ascii_case(html, start, &close) {
            Some(close_at) => {
                let after_close = close_at + close.len();
                match html[after_close..].find('>') {
                    Some(gt) => after_close + gt + 1,
                    None => return out,
                }
            }
            None => return out,
        };
    }
    out.push_str(&html[pos..]);
    out
}

/// Byte-wise ASCII-case-insensitive search. Tag names are ASCII, so the
/// match is exact on the original text; a lowercased copy would have
/// byte offsets that drift from the original for some Unicode input.
fn find_ignore_ascii_case(haystack: &str, from: usize, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    haystack[from..]
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
        .map(|found| from + found)
}

/// Replace every tag with a space so adjacent elements do not merge
/// into one word.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Decode the entities that show up in ordinary page text.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_at_char_boundary(text: &mut String, max_chars: usize) {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        text.truncate(cut);
    }
}
