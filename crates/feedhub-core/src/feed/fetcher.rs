use bytes::Bytes;
use std::time::Duration;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Proxy};
use url::Url;

use super::models::ParsedFeed;
use super::parser::parse_feed;
use super::Fetcher;
use crate::config::{AppConfig, HttpConfig};
use crate::{Error, Result};

const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.8";

/// HTTP feed fetcher
pub struct FeedFetcher {
    client: Client,
    max_feed_bytes: usize,
}

impl FeedFetcher {
    /// Create a new feed fetcher with configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::from_http_config(&config.http)
    }

    pub fn from_http_config(http: &HttpConfig) -> Result<Self> {
        let client = Self::build_client(http.request_timeout_secs, &http.proxy_url)?;

        Ok(Self {
            client,
            max_feed_bytes: http.max_feed_bytes,
        })
    }

    /// Build HTTP client with optional proxy
    fn build_client(timeout_secs: u64, proxy_url: &Option<String>) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(Self::build_headers())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        // Configure proxy if provided
        if let Some(ref proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for feed fetching");
        }

        builder.build().map_err(Error::Http)
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("feedhub/", env!("CARGO_PKG_VERSION"))),
        );
        headers
    }

    /// Fetch a document as raw bytes, failing on any non-success status
    pub async fn fetch_raw(&self, url: &str) -> Result<Bytes> {
        let url = Url::parse(url)?;

        tracing::debug!("Fetching feed from: {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(length) = response.content_length() {
            self.ensure_content_size(length as usize, url.as_str())?;
        }

        let body = response.bytes().await?;
        self.ensure_content_size(body.len(), url.as_str())?;

        Ok(body)
    }

    fn ensure_content_size(&self, size: usize, url: &str) -> Result<()> {
        if size > self.max_feed_bytes {
            return Err(Error::FeedParse(format!(
                "Feed too large ({} bytes) for URL: {}",
                size,
                url
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Fetcher for FeedFetcher {
    async fn fetch_and_parse(&self, url: &str) -> Result<ParsedFeed> {
        let body = self.fetch_raw(url).await?;
        parse_feed(&body)
    }
}
