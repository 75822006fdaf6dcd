use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;

const USER_AGENT: &str = concat!("book_scraper/", env!("CARGO_PKG_VERSION"), " (catalog scraper)");
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// How many body bytes to scan for a `<meta charset>` declaration.
const META_SNIFF_LEN: usize = 1024;

/// Page-fetching collaborator of the pagination driver.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    /// GET `url` and return the decoded document, or an error for any
    /// network failure or non-success status.
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

/// Production fetcher backed by a shared reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", url))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read body of {}", url))?;

        Ok(decode_body(&body, content_type.as_deref()))
    }
}

/// Decode response bytes using the charset the document declares: the
/// Content-Type header first, then a `<meta>` declaration in the body
/// prefix. Falls back to UTF-8 (lossy) when nothing is declared.
fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let label = content_type
        .and_then(charset_from_content_type)
        .or_else(|| sniff_meta_charset(&bytes[..bytes.len().min(META_SNIFF_LEN)]));
    let encoding = label
        .and_then(|l| encoding_rs::Encoding::for_label(l.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        param
            .trim()
            .to_ascii_lowercase()
            .strip_prefix("charset=")
            .map(|c| c.trim_matches('"').to_string())
    })
}

fn sniff_meta_charset(prefix: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(prefix).to_ascii_lowercase();
    let rest = &head[head.find("charset=")? + "charset=".len()..];
    let label: String = rest
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    (!label.is_empty()).then_some(label)
}

// ── Tests ──
