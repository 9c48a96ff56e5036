//! Concurrent, failure-isolated run over a list of sources.
//!
//! Each source goes through fetch (with retry), extract, and normalize on a
//! single task. A source either contributes all of its events or a single
//! [`ScrapeError`]; nothing one source does can abort another.

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use eventsweep_core::{EngineConfig, Event, RunReport, ScrapeError, Source};
use futures::{stream, FutureExt, StreamExt};
use tokio::time::Instant;

use crate::client::{FetchClient, RequestPlan};
use crate::error::ScraperError;
use crate::normalize::{normalize, RecoverySession, SourceContext};
use crate::registry::{builtin_registry, Registry};
use crate::retry::{retry_with_policy, RetryPolicy};
use crate::settings::Settings;
use crate::strategy::Strategy;
use crate::vision::VisionClient;

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Bound on each individual fetch attempt.
    pub per_source_timeout: Duration,
    pub max_concurrency: usize,
    /// Overall budget; sources still running when it expires are abandoned.
    pub deadline: Duration,
    /// Reference date for year inference and query placeholders.
    pub today: NaiveDate,
    pub window_days: u64,
}

impl RunOptions {
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self {
            per_source_timeout: Duration::from_secs(30),
            max_concurrency: 5,
            deadline: Duration::from_secs(300),
            today,
            window_days: 7,
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig, today: NaiveDate) -> Self {
        Self {
            per_source_timeout: Duration::from_secs(config.request_timeout_secs),
            max_concurrency: config.max_concurrent_sources,
            deadline: Duration::from_secs(config.run_deadline_secs),
            today,
            window_days: config.window_days,
        }
    }
}

/// A source that passed pre-flight.
struct Job<'s> {
    source: &'s Source,
    strategy: Strategy,
    plan: RequestPlan,
}

#[derive(Debug, Clone)]
pub struct Coordinator {
    client: FetchClient,
    registry: Registry,
    vision: Option<VisionClient>,
    policy: RetryPolicy,
}

impl Coordinator {
    /// Coordinator with the built-in strategies, the default retry policy,
    /// and no image recovery.
    #[must_use]
    pub fn new(client: FetchClient) -> Self {
        Self {
            client,
            registry: builtin_registry().clone(),
            vision: None,
            policy: RetryPolicy::default(),
        }
    }

    /// Builds the fetch client, retry policy (with jitter), and optional
    /// vision client from engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if an HTTP client cannot be built.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ScraperError> {
        let client = FetchClient::new(&config.user_agent)?;
        let vision = config.vision.as_ref().map(VisionClient::new).transpose()?;
        let policy = RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.retry_backoff_base_ms),
        )
        .with_jitter(true);

        Ok(Self {
            vision,
            policy,
            ..Self::new(client)
        })
    }

    #[must_use]
    pub fn with_vision(mut self, vision: VisionClient) -> Self {
        self.vision = Some(vision);
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs every source and returns what succeeded alongside what failed.
    ///
    /// Misconfigured sources are reported before anything is fetched and
    /// never touch the network. The rest run concurrently, at most
    /// `options.max_concurrency` at a time, and their results are collected
    /// by this task alone as each source finishes.
    pub async fn run(&self, sources: &[Source], options: &RunOptions) -> RunReport {
        let deadline = Instant::now() + options.deadline;
        let mut report = RunReport {
            source_count: sources.len(),
            ..RunReport::default()
        };

        let mut jobs = Vec::with_capacity(sources.len());
        for source in sources {
            match self.prepare(source, options) {
                Ok(job) => jobs.push(job),
                Err(err) => {
                    tracing::error!(
                        source = %source.key,
                        strategy = %source.strategy,
                        error = %err,
                        "source misconfigured, skipping fetch"
                    );
                    report.errors.push(scrape_error(source, &err, 0));
                }
            }
        }

        let mut outcomes = stream::iter(jobs)
            .map(|job| self.run_source(job, options, deadline))
            .buffer_unordered(options.max_concurrency.max(1));

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Ok(events) => report.events.extend(events),
                Err(error) => report.errors.push(error),
            }
        }

        if report.has_errors() {
            tracing::warn!(
                failed_sources = report.errors.len(),
                total_sources = report.source_count,
                "some sources failed during run"
            );
        }
        tracing::info!(
            events = report.events.len(),
            outcome = ?report.outcome(),
            "run complete"
        );
        report
    }

    fn prepare<'s>(&self, source: &'s Source, options: &RunOptions) -> Result<Job<'s>, ScraperError> {
        let strategy = self.registry.configure(source)?;
        let plan = RequestPlan::build(
            &source.url,
            &Settings::new(&source.settings),
            strategy.accept_header(),
            options.today,
            options.window_days,
        )?;
        Ok(Job {
            source,
            strategy,
            plan,
        })
    }

    async fn run_source(
        &self,
        job: Job<'_>,
        options: &RunOptions,
        deadline: Instant,
    ) -> Result<Vec<Event>, ScrapeError> {
        let attempts = AtomicU32::new(0);
        let result = guarded(
            deadline,
            options.deadline,
            self.pipeline(&job, options, &attempts),
        )
        .await;

        result.map_err(|err| {
            let attempts = attempts.load(Ordering::Relaxed);
            tracing::error!(
                source = %job.source.key,
                kind = %err.kind(),
                attempts,
                error = %err,
                "source failed"
            );
            scrape_error(job.source, &err, attempts)
        })
    }

    async fn pipeline(
        &self,
        job: &Job<'_>,
        options: &RunOptions,
        attempts: &AtomicU32,
    ) -> Result<Vec<Event>, ScraperError> {
        let source = job.source;
        let document = retry_with_policy(&self.policy, &source.key, || {
            attempts.fetch_add(1, Ordering::Relaxed);
            self.client.fetch(&job.plan, options.per_source_timeout)
        })
        .await?;

        let candidates = job.strategy.extract(&document)?;
        let total = candidates.len();

        let context = SourceContext {
            source,
            date_rules: job.strategy.date_rules(),
            today: options.today,
        };
        let mut recovery = RecoverySession::new(self.vision.as_ref());
        let mut seen = HashSet::new();
        let mut events = Vec::with_capacity(total);
        let mut rejected = 0usize;

        for candidate in candidates {
            match normalize(candidate, &context, &mut recovery).await {
                Ok(event) => {
                    if seen.insert(event.key()) {
                        events.push(event);
                    }
                }
                Err(reason) => {
                    rejected += 1;
                    tracing::debug!(source = %source.key, %reason, "dropped candidate");
                }
            }
        }

        if rejected > 0 {
            tracing::warn!(
                source = %source.key,
                rejected,
                candidates = total,
                "candidates failed validation"
            );
        }
        tracing::info!(
            source = %source.key,
            events = events.len(),
            unresolved = events.iter().filter(|e| !e.has_resolved_vendor()).count(),
            candidates = total,
            attempts = attempts.load(Ordering::Relaxed),
            "source complete"
        );
        Ok(events)
    }
}

/// Drives `pipeline` to completion unless `deadline` passes first, turning
/// a panic into a malformed-class error.
async fn guarded<T, F>(deadline: Instant, budget: Duration, pipeline: F) -> Result<T, ScraperError>
where
    F: Future<Output = Result<T, ScraperError>>,
{
    match tokio::time::timeout_at(deadline, AssertUnwindSafe(pipeline).catch_unwind()).await {
        Err(_elapsed) => Err(ScraperError::DeadlineExceeded {
            deadline_secs: budget.as_secs(),
        }),
        Ok(Err(payload)) => Err(ScraperError::Panicked(panic_message(payload.as_ref()))),
        Ok(Ok(result)) => result,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

fn scrape_error(source: &Source, err: &ScraperError, attempts: u32) -> ScrapeError {
    ScrapeError {
        source_key: source.key.clone(),
        source_name: source.name.clone(),
        message: err.to_string(),
        kind: err.kind(),
        attempts,
    }
}
