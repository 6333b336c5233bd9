//! scrape-chain main entry point
//!
//! Runs one chain definition against every URL given on the command line,
//! each on its own forked chain.

use clap::Parser;
use scrape_chain::config::load_config_with_hash;
use scrape_chain::{extract, Chain, ChainContext, HttpFetcher, RunOutcome};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// scrape-chain: run a step chain against one or more pages
///
/// Every page goes through the same steps: a status gate, an extraction
/// (title and links, or the text of a CSS selector) and an optional pause.
#[derive(Parser, Debug)]
#[command(name = "scrape-chain")]
#[command(version)]
#[command(about = "Run a step chain against one or more pages", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// URLs to run the chain against
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Status code a page must return for extraction to run
    #[arg(long, default_value_t = 200)]
    expect_status: u16,

    /// Print the text of elements matching this CSS selector instead of title and links
    #[arg(long)]
    selector: Option<String>,

    /// Pause after extraction, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((config, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let fetcher = HttpFetcher::new(&config)?;
    let chain = build_chain(fetcher, &cli);
    tracing::debug!("Chain has {} steps", chain.steps().len());

    let mut tasks = Vec::with_capacity(cli.urls.len());
    for url in cli.urls.clone() {
        let mut run = chain.fork();
        run.set_param(url.clone());
        tasks.push(tokio::spawn(async move {
            let result = run.get(&url).await;
            (url, result)
        }));
    }

    let total = tasks.len();
    let mut failures = 0;
    for task in tasks {
        let (url, result) = task.await?;
        match result {
            Ok(RunOutcome::Failed) | Err(_) => failures += 1,
            Ok(outcome) => tracing::info!("{}: {:?}", url, outcome),
        }
    }

    if failures > 0 {
        return Err(format!("{} of {} runs failed", failures, total).into());
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("scrape_chain=info,warn"),
            1 => EnvFilter::new("scrape_chain=debug,info"),
            2 => EnvFilter::new("scrape_chain=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Builds the chain every URL runs through
fn build_chain(fetcher: HttpFetcher, cli: &Cli) -> Chain<HttpFetcher> {
    let expected = cli.expect_status;

    let chain = Chain::new(fetcher).inspect_status(move |status, context| {
        if status != expected {
            tracing::warn!(
                "{}: status {} (expected {}), skipping",
                label(context),
                status,
                expected
            );
            context.stop();
        }
    });

    let chain = match &cli.selector {
        Some(selector) => chain.extract(
            extract::select_text_arg,
            |texts, context| {
                for text in texts {
                    println!("{}\t{}", label(context), text);
                }
            },
            vec![Value::from(selector.as_str())],
        ),
        None => chain.extract(
            |page, _| Ok((extract::title(page), extract::links(page))),
            |(title, links), context| {
                println!("{}\t{}", label(context), title.unwrap_or_default());
                for link in links {
                    println!("{}\t-> {}", label(context), link);
                }
            },
            vec![],
        ),
    };

    let chain = if cli.delay_ms > 0 {
        chain.delay(Duration::from_millis(cli.delay_ms))
    } else {
        chain
    };

    chain
        .on_error(|error, context| tracing::error!("{}: {}", label(context), error))
        .done(|context| tracing::debug!("{}: run finished", label(context)))
}

/// URL a run was started for, carried as the chain parameter
fn label(context: &ChainContext<HttpFetcher>) -> String {
    context.param::<String>().cloned().unwrap_or_default()
}
