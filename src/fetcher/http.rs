//! HTTP fetcher implementation
//!
//! This module provides the production [`Fetcher`] backed by reqwest and scraper:
//! - Building HTTP clients with proper user agent strings
//! - GET and configurable requests
//! - Keeping the last response for status checks and extraction
//! - Error classification

use crate::config::Config;
use crate::fetcher::{Fetcher, RequestOptions};
use crate::{ExtractError, FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, RequestBuilder};
use scraper::Html;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use url::Url;

/// Parsed view of the last response, handed to extraction functions
#[derive(Debug)]
pub struct Page {
    /// Final URL after redirects
    pub url: Url,

    /// HTTP status code
    pub status: u16,

    /// Parsed document
    pub html: Html,
}

impl Page {
    /// Parses `body` as an HTML document served from `url`
    pub fn parse(url: Url, status: u16, body: &str) -> Self {
        Self {
            url,
            status,
            html: Html::parse_document(body),
        }
    }
}

/// Raw data kept from the last response
#[derive(Debug)]
struct LastResponse {
    url: Url,
    status: u16,
    body: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use scrape_chain::config::Config;
/// use scrape_chain::fetcher::build_http_client;
///
/// let client = build_http_client(&Config::default()).unwrap();
/// ```
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    // Format: Name/Version (+ContactURL; ContactEmail)
    let user_agent = config.user_agent.header_value();

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.fetcher.timeout_secs))
        .connect_timeout(Duration::from_secs(config.fetcher.connect_timeout_secs))
        .redirect(Policy::limited(config.fetcher.max_redirects))
        .https_only(config.fetcher.https_only)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher performing real HTTP requests
///
/// Non-2xx responses are not errors: the status is recorded and exposed via
/// [`Fetcher::status_code`] so chains can branch on it.
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    last: Mutex<Option<LastResponse>>,
}

impl HttpFetcher {
    /// Creates a fetcher with a client built from `config`
    pub fn new(config: &Config) -> FetchResult<Self> {
        Ok(Self::with_client(build_http_client(config)?))
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            last: Mutex::new(None),
        }
    }

    /// Final URL of the last response, if any
    pub fn last_url(&self) -> Option<Url> {
        self.last().as_ref().map(|last| last.url.clone())
    }

    fn last(&self) -> MutexGuard<'_, Option<LastResponse>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends a prepared request and records the response
    async fn send(&self, builder: RequestBuilder, url: &str) -> FetchResult<()> {
        // A failed request must not leave a stale status behind
        *self.last() = None;

        let response = builder.send().await.map_err(|e| classify(url, e))?;
        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| classify(url, e))?;

        tracing::debug!("Fetched {} (status {}, {} bytes)", final_url, status, body.len());

        *self.last() = Some(LastResponse {
            url: final_url,
            status,
            body,
        });

        Ok(())
    }

    /// Parses the stored body and runs `extract` against it
    fn extract_last<T, E>(&self, extract: E, args: &[Value]) -> FetchResult<T>
    where
        E: Fn(&Page, &[Value]) -> Result<T, ExtractError>,
    {
        let guard = self.last();
        let last = guard.as_ref().ok_or(FetchError::NoResponse)?;
        let page = Page::parse(last.url.clone(), last.status, &last.body);
        Ok(extract(&page, args)?)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    type Document = Page;

    fn status_code(&self) -> u16 {
        self.last().as_ref().map(|last| last.status).unwrap_or(0)
    }

    async fn get(&self, url: &str) -> FetchResult<()> {
        let parsed = parse_url(url)?;
        self.send(self.client.get(parsed), url).await
    }

    async fn request(&self, options: RequestOptions) -> FetchResult<()> {
        let parsed = parse_url(&options.url)?;

        let mut builder = self.client.request(options.method, parsed);
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(body) = options.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        self.send(builder, &options.url).await
    }

    async fn scrape<T, E>(&self, extract: E, args: &[Value]) -> FetchResult<T>
    where
        T: Send + 'static,
        E: Fn(&Page, &[Value]) -> Result<T, ExtractError> + Send + Sync,
    {
        self.extract_last(extract, args)
    }

    fn fork(&self) -> Self {
        // reqwest clients share their pool; the response state is what must be fresh
        Self::with_client(self.client.clone())
    }

    async fn close(&self) {
        if self.last().take().is_some() {
            tracing::trace!("Released last response");
        }
    }
}

fn parse_url(url: &str) -> FetchResult<Url> {
    Url::parse(url).map_err(|source| FetchError::InvalidUrl {
        url: url.to_string(),
        source,
    })
}

/// Maps a reqwest error onto the fetch error taxonomy
fn classify(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Connect {
            url: url.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
