//! In-memory fetcher for unit tests

use crate::fetcher::{Fetcher, RequestOptions};
use crate::{ExtractError, FetchError, FetchResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Serves a canned status and body, records calls
#[derive(Debug, Default)]
pub(crate) struct MockFetcher {
    pub status: u16,
    pub body: String,
    pub fail_request: bool,
    pub fail_scrape: bool,
    current: AtomicU16,
    pub requested: Mutex<Vec<String>>,
    pub closes: Arc<AtomicUsize>,
    pub forks: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn failing_request(mut self) -> Self {
        self.fail_request = true;
        self
    }

    pub fn failing_scrape(mut self) -> Self {
        self.fail_scrape = true;
        self
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn respond(&self, url: &str) -> FetchResult<()> {
        self.requested.lock().unwrap().push(url.to_string());
        if self.fail_request {
            return Err(FetchError::Connect {
                url: url.to_string(),
            });
        }
        self.current.store(self.status, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    type Document = String;

    fn status_code(&self) -> u16 {
        self.current.load(Ordering::SeqCst)
    }

    async fn get(&self, url: &str) -> FetchResult<()> {
        self.respond(url)
    }

    async fn request(&self, options: RequestOptions) -> FetchResult<()> {
        self.respond(&options.url)
    }

    async fn scrape<T, E>(&self, extract: E, args: &[Value]) -> FetchResult<T>
    where
        T: Send + 'static,
        E: Fn(&String, &[Value]) -> Result<T, ExtractError> + Send + Sync,
    {
        if self.fail_scrape {
            return Err(FetchError::NoResponse);
        }
        Ok(extract(&self.body, args)?)
    }

    fn fork(&self) -> Self {
        self.forks.fetch_add(1, Ordering::SeqCst);
        Self {
            status: self.status,
            body: self.body.clone(),
            fail_request: self.fail_request,
            fail_scrape: self.fail_scrape,
            current: AtomicU16::new(0),
            requested: Mutex::new(Vec::new()),
            closes: Arc::clone(&self.closes),
            forks: Arc::clone(&self.forks),
        }
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
