//! scrape-chain: sequential task chains over a fetcher
//!
//! This crate lets a caller declare an ordered list of asynchronous steps
//! (status checks, content extraction, delays, generic callbacks) and run them
//! one at a time after an initiating HTTP request, short-circuiting on error or
//! on an explicit stop.

pub mod chain;
pub mod config;
pub mod extract;
pub mod fetcher;

use thiserror::Error;

/// Main error type for chain runs
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Step failed: {0}")]
    Step(#[from] anyhow::Error),

    #[error("Step {step} finished without signaling completion")]
    Abandoned { step: usize },

    #[error("Step {step} panicked: {message}")]
    Panicked { step: usize, message: String },
}

/// Errors raised by a fetcher while requesting or scraping
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: ::url::ParseError,
    },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}")]
    Connect { url: String },

    #[error("No response available to scrape")]
    NoResponse,

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

/// Errors produced by extraction functions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),

    #[error("Nothing matched: {0}")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for chain runs
pub type Result<T> = std::result::Result<T, ChainError>;

/// Result type alias for fetcher operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use chain::{Chain, ChainContext, Completion, RunOutcome};
pub use config::Config;
pub use fetcher::{Fetcher, HttpFetcher, Page, RequestOptions};
