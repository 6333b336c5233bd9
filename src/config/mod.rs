//! Configuration module for scrape-chain
//!
//! This module handles loading, parsing, and validating the TOML configuration
//! used to build an [`HttpFetcher`](crate::HttpFetcher).
//!
//! # Example
//!
//! ```no_run
//! use scrape_chain::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("chain.toml")).unwrap();
//! println!("Request timeout: {}s", config.fetcher.timeout_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FetcherConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
