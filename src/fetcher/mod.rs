//! Fetcher capability used by chains
//!
//! A chain never talks to the network or parses HTML itself. Everything it
//! needs goes through the [`Fetcher`] trait:
//! - performing the initiating GET or configurable request
//! - reporting the last response status
//! - running extraction functions against the last response
//! - producing fresh instances for forked chains
//! - releasing held resources at the end of a run

mod http;
#[cfg(test)]
pub(crate) mod mock;
mod options;

pub use http::{build_http_client, HttpFetcher, Page};
pub use options::RequestOptions;

use crate::{ExtractError, FetchResult};
use async_trait::async_trait;
use serde_json::Value;

/// Network and extraction collaborator driven by a [`Chain`](crate::Chain)
///
/// Implementations keep the state of the last response internally, so every
/// method takes `&self`. A single instance is only ever driven by one run at
/// a time; independent runs get their own instance through [`Fetcher::fork`].
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Document handed to extraction functions
    type Document;

    /// Status code of the last response, or 0 if nothing was fetched yet
    fn status_code(&self) -> u16;

    /// Performs a GET against `url`
    async fn get(&self, url: &str) -> FetchResult<()>;

    /// Performs a request described by `options`
    async fn request(&self, options: RequestOptions) -> FetchResult<()>;

    /// Runs `extract` against the last response
    async fn scrape<T, E>(&self, extract: E, args: &[Value]) -> FetchResult<T>
    where
        T: Send + 'static,
        E: Fn(&Self::Document, &[Value]) -> Result<T, ExtractError> + Send + Sync;

    /// Returns a new, independent instance with the same configuration baseline
    fn fork(&self) -> Self
    where
        Self: Sized;

    /// Releases held resources; safe to call more than once
    async fn close(&self);
}
