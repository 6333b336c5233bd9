//! Chain module: step registration and sequential execution
//!
//! This module contains the chain engine, including:
//! - The fluent [`Chain`] builder and its terminal callbacks
//! - The shared [`StepRegistry`]
//! - The per-run [`ChainContext`]
//! - Per-step completion and stop signals
//! - The dispatcher walking steps one at a time
//!
//! # Example
//!
//! ```no_run
//! use scrape_chain::config::Config;
//! use scrape_chain::{Chain, HttpFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let chain = Chain::new(HttpFetcher::new(&Config::default())?)
//!     .on_status(404, |context| context.stop())
//!     .then(|context| println!("status {}", context.status_code()));
//!
//! // Same steps, separate fetchers
//! let mut first = chain.fork();
//! let mut second = chain.fork();
//! first.get("https://example.com/a").await?;
//! second.get("https://example.com/b").await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod context;
mod dispatcher;
mod signal;
mod step;

pub use builder::{Chain, DoneCallback, ErrorCallback, RunOutcome};
pub use context::{ChainContext, ChainHandle, ChainParam};
pub use signal::{Completion, StepSignal, StopHandle};
pub use step::{step_fn, Step, StepFuture, StepRegistry};
