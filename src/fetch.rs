use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use log::debug;

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Headers sent with every watch page request. The consent cookie skips the EU interstitial.
pub const WATCH_PAGE_HEADERS: &[(&str, &str)] = &[
    ("User-Agent", USER_AGENT),
    ("Accept-Language", "en-US,en;q=0.9"),
    ("Cookie", "CONSENT=YES+1"),
];

pub const BROWSER_HEADERS: &[(&str, &str)] = &[("User-Agent", USER_AGENT)];

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP used by the strategies.
///
/// Non-2xx responses come back as values; only transport failures are errors.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<FetchResponse>;

    async fn post_json(&self, url: &str, headers: &[(&str, &str)], body: &serde_json::Value) -> Result<FetchResponse>;
}

/// `Fetch` backed by reqwest with a per-request timeout
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

async fn into_response(resp: reqwest::Response) -> Result<FetchResponse> {
    let status = resp.status().as_u16();
    let body = resp.text().await?;
    Ok(FetchResponse { status, body })
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<FetchResponse> {
        debug!("GET {url}");
        let mut req = self.client.get(url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        into_response(req.send().await?).await
    }

    async fn post_json(&self, url: &str, headers: &[(&str, &str)], body: &serde_json::Value) -> Result<FetchResponse> {
        debug!("POST {url}");
        let mut req = self.client.post(url).header("Content-Type", "application/json");
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        into_response(req.json(body).send().await?).await
    }
}
