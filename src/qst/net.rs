// src/qst/net.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// Body plus HTTP status of a fetch. Some APIs (OpenWeather) report errors
/// in-band, so the status is handed back instead of being turned into an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub status: u16,
    pub body: String,
}

impl Fetched {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body of a 2xx response, error otherwise.
    pub fn into_success(self, url: &str) -> Result<String> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(anyhow!("GET {url} returned HTTP {}", self.status))
        }
    }
}

#[async_trait]
pub trait TextFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fetched>;
}

/// reqwest-backed fetcher shared by the feed, weather and remote-file producers.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("qst-broadcast/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TextFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.context("reading response body")?;
        tracing::debug!(url, status, bytes = body.len(), "fetched");
        Ok(Fetched { status, body })
    }
}

pub fn is_remote(location: &str) -> bool {
    let lower = location.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Read a local path or an http(s) URL into a string.
pub async fn open_net_file(fetcher: &dyn TextFetcher, location: &str) -> Result<String> {
    if is_remote(location) {
        fetcher.fetch(location.trim()).await?.into_success(location)
    } else {
        let bytes = tokio::fs::read(location)
            .await
            .with_context(|| format!("reading {location}"))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// --- Test helper ---
/// Fetcher that serves one canned response and records requested URLs.
pub struct StaticFetcher {
    response: Mutex<Result<Fetched, String>>,
    pub requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new(body: &str) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: &str) -> Self {
        Self {
            response: Mutex::new(Ok(Fetched {
                status,
                body: body.to_string(),
            })),
            requests: Mutex::new(vec![]),
        }
    }

    /// Every fetch fails with `message` until a body is set again.
    pub fn failing(message: &str) -> Self {
        Self {
            response: Mutex::new(Err(message.to_string())),
            requests: Mutex::new(vec![]),
        }
    }

    pub fn set_body(&self, body: &str) {
        *self.response.lock().unwrap() = Ok(Fetched::ok(body));
    }

    pub fn last_request(&self) -> Option<String> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        self.requests.lock().unwrap().push(url.to_string());
        match &*self.response.lock().unwrap() {
            Ok(f) => Ok(f.clone()),
            Err(msg) => Err(anyhow!("{msg}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_detection_is_scheme_based() {
        assert!(is_remote("http://example.org/qst.txt"));
        assert!(is_remote("HTTPS://example.org/qst.txt"));
        assert!(!is_remote("/var/lib/qst.txt"));
        assert!(!is_remote("C:\\qst\\http.txt"));
    }

    #[test]
    fn non_success_status_is_an_error() {
        let f = Fetched {
            status: 503,
            body: "busy".into(),
        };
        assert!(f.into_success("http://x").is_err());
        assert_eq!(Fetched::ok("a").into_success("http://x").unwrap(), "a");
    }
}
