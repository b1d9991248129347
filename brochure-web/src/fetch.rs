use async_trait::async_trait;
use brochure_common::{BrochureError, FetchConfig, Result};
use brochure_http::{HttpClient, RequestOpts};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use url::Url;

use crate::extract::parse_webpage;
use crate::webpage::Webpage;

/// Source of [`Webpage`]s.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch and parse `url`. Failures yield [`Webpage::empty`].
    async fn fetch(&self, url: &str) -> Webpage;
}

/// Fetches pages over HTTP with a browser-like User-Agent.
///
/// One attempt per page; the timeout comes from [`FetchConfig`].
#[derive(Clone)]
pub struct HttpPageFetcher {
    client: HttpClient,
    headers: HeaderMap,
}

impl HttpPageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = HttpClient::detached()
            .map_err(|e| BrochureError::Config(format!("HttpClient init failed: {e}")))?
            .with_timeout(config.timeout())
            .with_retries(0);

        let user_agent = HeaderValue::from_str(config.user_agent.trim())
            .map_err(|e| BrochureError::Config(format!("invalid user agent: {e}")))?;
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, user_agent);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );

        Ok(Self { client, headers })
    }

    async fn try_fetch(&self, url: &str) -> Result<Webpage> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| BrochureError::Fetch(format!("invalid URL {url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BrochureError::Fetch(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        let html = self
            .client
            .get_text(
                parsed.as_str(),
                RequestOpts {
                    headers: Some(self.headers.clone()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BrochureError::Fetch(e.to_string()))?;

        Ok(parse_webpage(&parsed, &html))
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Webpage {
        match self.try_fetch(url).await {
            Ok(page) => {
                tracing::info!(
                    url,
                    title=%page.title,
                    text_chars=page.text.chars().count(),
                    links=page.links.len(),
                    "web.fetch.ok"
                );
                page
            }
            Err(e) => {
                tracing::warn!(url, error=%e, "web.fetch.failed");
                Webpage::empty(url)
            }
        }
    }
}
