//! URL fetching for `fetch_url`.

use async_trait::async_trait;
use std::time::Duration;
use tessera_core::error::ToolError;
use tracing::debug;

/// Fetches the text behind an external URL.
#[async_trait]
pub trait UrlFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ToolError>;
}

/// Plain HTTP GET through `reqwest`, with a response size cap.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
    timeout_secs: u64,
}

impl HttpFetcher {
    pub const DEFAULT_MAX_BYTES: usize = 512 * 1024;

    pub fn new(timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .user_agent(concat!("tessera/", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("Failed to build HTTP client"),
            max_bytes: Self::DEFAULT_MAX_BYTES,
            timeout_secs,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(30)
    }
}

fn failed(reason: impl Into<String>) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: "fetch_url".into(),
        reason: reason.into(),
    }
}

/// Only absolute http(s) URLs are fetched.
pub fn validate_url(url: &str) -> Result<(), ToolError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ToolError::InvalidArguments(
            "URL must start with http:// or https://".into(),
        ));
    }
    Ok(())
}

/// Cut `text` to at most `max_bytes`, on a char boundary, with a marker.
pub fn truncate_body(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    text.push_str("\n[truncated]");
    text
}

#[async_trait]
impl UrlFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ToolError> {
        validate_url(url)?;
        debug!(url = %url, "Fetching URL");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout {
                    tool_name: "fetch_url".into(),
                    timeout_secs: self.timeout_secs,
                }
            } else {
                failed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status} from {url}")));
        }

        let body = response.text().await.map_err(|e| failed(e.to_string()))?;
        Ok(truncate_body(body, self.max_bytes))
    }
}
