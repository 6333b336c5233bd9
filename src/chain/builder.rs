//! Fluent chain builder
//!
//! A [`Chain`] accumulates steps, holds the terminal callbacks and owns the
//! fetcher. Triggering a run (`get` / `request`) performs the initiating
//! request, dispatches the steps and always finishes in this order:
//! 1. `on_error` (only on an error, only if set)
//! 2. `done` (every run)
//! 3. `Fetcher::close`
//!
//! An error without an `on_error` callback is returned as `Err` after `done`
//! has run.

use crate::chain::context::{ChainHandle, ChainParam};
use crate::chain::dispatcher::dispatch;
use crate::chain::{step_fn, ChainContext, Completion, StepFuture, StepRegistry};
use crate::fetcher::{Fetcher, RequestOptions};
use crate::{ChainError, ExtractError, FetchError, FetchResult};
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked once at the end of every run
pub type DoneCallback<F> = Arc<dyn Fn(&ChainContext<F>) + Send + Sync>;

/// Callback invoked when a run ends with an error
pub type ErrorCallback<F> = Arc<dyn Fn(&ChainError, &ChainContext<F>) + Send + Sync>;

/// How a run ended when no error escaped it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step ran
    Completed,
    /// A step stopped the chain gracefully
    Stopped,
    /// A step or the initiating request failed and `on_error` handled it
    Failed,
}

/// Ordered chain of steps bound to one fetcher
///
/// # Example
///
/// ```no_run
/// use scrape_chain::config::Config;
/// use scrape_chain::{extract, Chain, HttpFetcher};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = HttpFetcher::new(&Config::default())?;
/// let mut chain = Chain::new(fetcher)
///     .on_status(200, |_| println!("page is up"))
///     .extract(
///         |page, _| Ok(extract::title(page)),
///         |title, _| println!("title: {:?}", title),
///         vec![],
///     )
///     .done(|_| println!("finished"));
///
/// chain.get("https://example.com/").await?;
/// # Ok(())
/// # }
/// ```
pub struct Chain<F> {
    fetcher: Arc<F>,
    steps: StepRegistry<F>,
    done: DoneCallback<F>,
    on_error: Option<ErrorCallback<F>>,
    param: Option<ChainParam>,
}

impl<F: Fetcher> Chain<F> {
    /// Creates an empty chain around `fetcher`
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            steps: StepRegistry::new(),
            done: Arc::new(|_: &ChainContext<F>| {}),
            on_error: None,
            param: None,
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn steps(&self) -> &StepRegistry<F> {
        &self.steps
    }

    /// Appends a raw step
    ///
    /// The step must consume its [`Completion`] exactly once, or stop the chain
    /// through its context. Dropping the completion unsignaled fails the run
    /// with [`ChainError::Abandoned`] once the step's future returns, even if
    /// the step holds on to a clone of its context. A panic fails the run
    /// with [`ChainError::Panicked`].
    pub fn step<S>(self, step: S) -> Self
    where
        S: Fn(Completion, ChainContext<F>) -> StepFuture + Send + Sync + 'static,
    {
        self.steps.push(step_fn(step));
        self
    }

    /// Appends a step running `callback` only when the last status equals `code`
    ///
    /// A mismatch is not an error: the chain continues either way.
    pub fn on_status<C>(self, code: u16, callback: C) -> Self
    where
        C: Fn(&ChainContext<F>) + Send + Sync + 'static,
    {
        self.step(move |completion, context| {
            let status = context.status_code();
            if status == code {
                callback(&context);
            } else {
                tracing::debug!("Status {} does not match {}; skipping callback", status, code);
            }
            completion.done();
            Box::pin(async { Ok(()) })
        })
    }

    /// Appends a step running `callback` with the last status code
    pub fn inspect_status<C>(self, callback: C) -> Self
    where
        C: Fn(u16, &ChainContext<F>) + Send + Sync + 'static,
    {
        self.step(move |completion, context| {
            callback(context.status_code(), &context);
            completion.done();
            Box::pin(async { Ok(()) })
        })
    }

    /// Appends a step extracting data from the last response
    ///
    /// `extract` runs through [`Fetcher::scrape`] with `args`. On success
    /// `callback` receives the result. A failing extraction aborts the chain
    /// with [`ChainError::Extract`]; any other fetcher error aborts it with
    /// [`ChainError::Fetch`].
    pub fn extract<T, X, C>(self, extract: X, callback: C, args: Vec<Value>) -> Self
    where
        T: Send + 'static,
        X: Fn(&F::Document, &[Value]) -> Result<T, ExtractError> + Send + Sync + 'static,
        C: Fn(T, &ChainContext<F>) + Send + Sync + 'static,
    {
        let extract = Arc::new(extract);
        let callback = Arc::new(callback);
        let args: Arc<[Value]> = args.into();

        self.step(move |completion, context| {
            let extract = Arc::clone(&extract);
            let callback = Arc::clone(&callback);
            let args = Arc::clone(&args);

            Box::pin(async move {
                match context.fetcher().scrape(&*extract, &args).await {
                    Ok(result) => {
                        callback(result, &context);
                        completion.done();
                    }
                    Err(FetchError::Extract(error)) => completion.fail(error),
                    Err(error) => completion.fail(error),
                }
                Ok(())
            })
        })
    }

    /// Appends a step pausing the chain for `duration`
    pub fn delay(self, duration: Duration) -> Self {
        self.delay_then(duration, |_| {})
    }

    /// Appends a step pausing the chain for `duration`, then running `callback`
    pub fn delay_then<C>(self, duration: Duration, callback: C) -> Self
    where
        C: Fn(&ChainContext<F>) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);

        self.step(move |completion, context| {
            let callback = Arc::clone(&callback);

            Box::pin(async move {
                tokio::time::sleep(duration).await;
                callback(&context);
                completion.done();
                Ok(())
            })
        })
    }

    /// Appends a step scheduling `callback` after `duration` without waiting for it
    ///
    /// The chain moves on immediately. The callback is not ordered relative to
    /// later steps, still fires if the chain stops, and cannot stop the chain.
    pub fn defer<C>(self, duration: Duration, callback: C) -> Self
    where
        C: Fn(&ChainContext<F>) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);

        self.step(move |completion, context| {
            let callback = Arc::clone(&callback);
            let detached = context.detached();

            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                callback(&detached);
            });

            completion.done();
            Box::pin(async { Ok(()) })
        })
    }

    /// Appends a step running `callback` synchronously
    pub fn then<C>(self, callback: C) -> Self
    where
        C: Fn(&ChainContext<F>) + Send + Sync + 'static,
    {
        self.try_then(move |context| {
            callback(context);
            Ok(())
        })
    }

    /// Appends a step running a fallible `callback`; an `Err` aborts the chain
    pub fn try_then<C>(self, callback: C) -> Self
    where
        C: Fn(&ChainContext<F>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.step(move |completion, context| {
            let result = callback(&context).map_err(ChainError::from);
            if result.is_ok() {
                completion.done();
            }
            Box::pin(async move { result })
        })
    }

    /// Sets the callback invoked at the end of every run
    pub fn done<C>(mut self, callback: C) -> Self
    where
        C: Fn(&ChainContext<F>) + Send + Sync + 'static,
    {
        self.done = Arc::new(callback);
        self
    }

    /// Sets the callback receiving errors
    ///
    /// Without it, an error is returned from `get` / `request` after `done`.
    pub fn on_error<C>(mut self, callback: C) -> Self
    where
        C: Fn(&ChainError, &ChainContext<F>) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Stashes a value exposed through [`ChainContext::param`] on the next run only
    pub fn set_param<P: Any + Send + Sync>(&mut self, param: P) -> &mut Self {
        self.param = Some(Arc::new(param));
        self
    }

    /// Performs a GET against `url`, then runs the steps
    pub async fn get(&mut self, url: &str) -> crate::Result<RunOutcome> {
        tracing::info!("Starting chain with GET {}", url);
        let trigger = self.fetcher.get(url).await;
        self.fire(trigger).await
    }

    /// Performs the request described by `options`, then runs the steps
    pub async fn request(&mut self, options: RequestOptions) -> crate::Result<RunOutcome> {
        tracing::info!("Starting chain with {} {}", options.method, options.url);
        let trigger = self.fetcher.request(options).await;
        self.fire(trigger).await
    }

    /// Creates a chain with a fresh fetcher sharing this chain's steps and callbacks
    ///
    /// The step registry is shared by reference: steps appended to either
    /// chain afterwards are seen by both. The carried parameter is not copied.
    pub fn fork(&self) -> Self {
        Self {
            fetcher: Arc::new(self.fetcher.fork()),
            steps: self.steps.clone(),
            done: Arc::clone(&self.done),
            on_error: self.on_error.clone(),
            param: None,
        }
    }

    async fn fire(&mut self, trigger: FetchResult<()>) -> crate::Result<RunOutcome> {
        let handle = ChainHandle::new(Arc::clone(&self.fetcher), self.steps.clone());
        let context = ChainContext::new(handle, self.param.take());

        let halted = match trigger {
            Ok(()) => {
                let steps = self.steps.snapshot();
                dispatch(&steps, &context).await
            }
            Err(error) => {
                tracing::warn!("Initiating request failed: {}", error);
                Err(ChainError::Fetch(error))
            }
        };

        let result = self.finish(halted, &context);
        self.fetcher.close().await;
        result
    }

    fn finish(
        &self,
        halted: crate::Result<RunOutcome>,
        context: &ChainContext<F>,
    ) -> crate::Result<RunOutcome> {
        match halted {
            Ok(outcome) => {
                tracing::info!("Chain finished: {:?}", outcome);
                (self.done)(context);
                Ok(outcome)
            }
            Err(error) => match &self.on_error {
                Some(on_error) => {
                    tracing::info!("Chain failed: {}", error);
                    on_error(&error, context);
                    (self.done)(context);
                    Ok(RunOutcome::Failed)
                }
                None => {
                    (self.done)(context);
                    tracing::error!("Unhandled chain error: {}", error);
                    Err(error)
                }
            },
        }
    }
}

impl<F> std::fmt::Debug for Chain<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("steps", &self.steps)
            .field("has_on_error", &self.on_error.is_some())
            .field("has_param", &self.param.is_some())
            .finish_non_exhaustive()
    }
}
