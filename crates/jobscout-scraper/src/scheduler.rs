//! The scheduling loop driving every configured crawler on its own cadence.
//!
//! One control task runs crawlers sequentially: resolve each crawler's
//! cadence for the current hour, run the ones that are due, then sleep
//! until the next one comes due. The sleep is a `select!` over the
//! shutdown channel, never a dead wait. A single crawler's failure is
//! logged and summarized — it never takes the process down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Timelike;
use tokio::sync::watch;

use jobscout_core::{cadence::resolve_timer, CrawlerConfig};
use jobscout_state::StateStore;

use crate::error::ScrapeError;
use crate::executor::Executor;
use crate::retry::RetryOptions;
use crate::sites::NavigatorFactory;
use crate::store::JobStore;

/// Idle sleep when no crawler has a pending cadence (e.g. everything is
/// `ignore_auto_run`).
const IDLE_SLEEP: Duration = Duration::from_secs(60);

/// Scheduling behavior, fixed from process start to shutdown.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sleep one full interval before the first run instead of running
    /// immediately.
    pub wait_before_first_run: bool,
    /// Start the first pass at this crawler (case-insensitive), running it
    /// even when flagged `ignore_auto_run`.
    pub starting_at: Option<String>,
    /// Stop after one pass; used by tests and one-shot tooling.
    pub run_once: bool,
    /// Keep each crawler's tab and session warm between runs.
    pub run_in_tabs: bool,
    pub retry: RetryOptions,
    /// Freshness window for keyword skipping, forwarded to executors.
    pub skip_fresh: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            wait_before_first_run: false,
            starting_at: None,
            run_once: false,
            run_in_tabs: false,
            retry: RetryOptions::default(),
            skip_fresh: Duration::from_secs(21_600),
        }
    }
}

pub struct Scheduler {
    crawlers: Vec<CrawlerConfig>,
    config: SchedulerConfig,
    navigators: Arc<dyn NavigatorFactory>,
    store: Arc<dyn JobStore>,
    state: Arc<StateStore>,
    shutdown: watch::Receiver<bool>,
    /// Executors kept alive between passes in tab mode.
    warm: HashMap<String, Executor>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        crawlers: Vec<CrawlerConfig>,
        config: SchedulerConfig,
        navigators: Arc<dyn NavigatorFactory>,
        store: Arc<dyn JobStore>,
        state: Arc<StateStore>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            crawlers,
            config,
            navigators,
            store,
            state,
            shutdown,
            warm: HashMap::new(),
        }
    }

    /// Runs every auto-run crawler on its cadence, forever (or once).
    ///
    /// # Errors
    ///
    /// Configuration errors — an unknown `starting_at` name or a malformed
    /// run window — are fatal and surface immediately. Crawl failures are
    /// not: they are logged, summarized, and the loop continues.
    pub async fn run_all(&mut self) -> Result<(), ScrapeError> {
        let starting_at = match &self.config.starting_at {
            Some(name) => Some(self.canonical(name)?.name.clone()),
            None => None,
        };

        let mut last_run: HashMap<String, Instant> = HashMap::new();
        if self.config.wait_before_first_run {
            let now = Instant::now();
            for crawler in &self.crawlers {
                last_run.insert(crawler.name.clone(), now);
            }
        }

        // On the first pass, skip everything declared before the named
        // starting crawler.
        let mut skip_until = starting_at.clone();

        loop {
            let mut next_wake: Option<Duration> = None;
            let crawlers = self.crawlers.clone();

            for crawler in &crawlers {
                if self.is_shutdown() {
                    return Ok(());
                }
                if let Some(start) = &skip_until {
                    if !crawler.name.eq(start) {
                        continue;
                    }
                    skip_until = None;
                }

                let explicitly_named = starting_at.as_deref() == Some(crawler.name.as_str());
                if crawler.ignore_auto_run && !explicitly_named {
                    continue;
                }

                let cadence = resolve_timer(crawler, chrono::Local::now().hour())?;
                let due = last_run
                    .get(&crawler.name)
                    .is_none_or(|at| at.elapsed() >= cadence.interval);

                if due {
                    tracing::info!(
                        crawler = %crawler.name,
                        window = %cadence.window,
                        interval_secs = cadence.interval.as_secs(),
                        "crawler due — running"
                    );
                    match self.run_crawler(crawler).await {
                        Ok(()) => {}
                        Err(ScrapeError::Cancelled) => return Ok(()),
                        Err(err) => return Err(err),
                    }
                    last_run.insert(crawler.name.clone(), Instant::now());
                }

                let elapsed = last_run
                    .get(&crawler.name)
                    .map_or(Duration::ZERO, Instant::elapsed);
                let remaining = cadence.interval.saturating_sub(elapsed);
                next_wake = Some(next_wake.map_or(remaining, |w| w.min(remaining)));
            }

            if self.config.run_once {
                return Ok(());
            }

            let sleep_for = next_wake.unwrap_or(IDLE_SLEEP).max(Duration::from_secs(1));
            tracing::debug!(sleep_secs = sleep_for.as_secs(), "pass complete — sleeping");
            tokio::select! {
                () = tokio::time::sleep(sleep_for) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Runs exactly the named crawlers, in the given order, ignoring
    /// cadence and `ignore_auto_run`.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::UnknownCrawler`] if any name fails to resolve — the
    /// whole request is rejected before anything runs.
    pub async fn run_specified(&mut self, names: &[String]) -> Result<(), ScrapeError> {
        let resolved: Vec<CrawlerConfig> = names
            .iter()
            .map(|name| self.canonical(name).cloned())
            .collect::<Result<_, _>>()?;

        for crawler in &resolved {
            if self.is_shutdown() {
                return Ok(());
            }
            match self.run_crawler(crawler).await {
                Ok(()) => {}
                Err(ScrapeError::Cancelled) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Runs one crawler through preload + execute, isolating its failures.
    ///
    /// # Errors
    ///
    /// Only cancellation and fatal configuration errors propagate; crawl
    /// and infrastructure failures are logged here.
    async fn run_crawler(&mut self, crawler: &CrawlerConfig) -> Result<(), ScrapeError> {
        let name = crawler.name.clone();
        let keep_warm = self.config.run_in_tabs && !crawler.close_tab;

        let mut exec = match self.warm.remove(&name) {
            Some(exec) => exec,
            None => match self.navigators.build(crawler).await {
                Ok(navigator) => Executor::new(
                    crawler.clone(),
                    navigator,
                    Arc::clone(&self.store),
                    Arc::clone(&self.state),
                    self.config.retry,
                    self.config.skip_fresh,
                    self.shutdown.clone(),
                ),
                Err(err @ ScrapeError::UnknownCrawler { .. }) => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        crawler = %name,
                        error = %err,
                        "could not open a tab for this crawler — skipping this run"
                    );
                    return Ok(());
                }
            },
        };

        let outcome = async {
            exec.execute_preload().await?;
            exec.execute().await
        }
        .await;

        let mut cancelled = false;
        match outcome {
            Ok(report) => {
                tracing::info!(
                    crawler = %name,
                    keywords_run = report.keywords_run,
                    keywords_skipped = report.keywords_skipped,
                    keywords_failed = report.keywords_failed,
                    jobs_seen = report.jobs_seen,
                    jobs_inserted = report.jobs_inserted,
                    "crawler run finished"
                );
            }
            Err(ScrapeError::Cancelled) => cancelled = true,
            Err(err) => {
                tracing::error!(crawler = %name, error = %err, "crawler run failed");
            }
        }

        self.report_failures(&name);

        if keep_warm && !cancelled {
            self.warm.insert(name, exec);
        } else {
            exec.close().await;
        }

        if cancelled {
            return Err(ScrapeError::Cancelled);
        }
        Ok(())
    }

    /// End-of-run failure summary for one crawler.
    fn report_failures(&self, crawler: &str) {
        let failures = self.state.failure_summary(crawler);
        if failures.is_empty() {
            return;
        }
        tracing::warn!(
            crawler,
            failed_keywords = failures.len(),
            "crawler has recorded keyword failures"
        );
        for failure in failures {
            tracing::warn!(
                crawler,
                keyword = %failure.keyword,
                error = failure.last_error.as_deref().unwrap_or("unknown"),
                at = ?failure.last_error_time,
                "keyword failure"
            );
        }
    }

    /// Case-insensitive crawler lookup returning the canonical config.
    fn canonical(&self, name: &str) -> Result<&CrawlerConfig, ScrapeError> {
        self.crawlers
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ScrapeError::UnknownCrawler {
                name: name.to_string(),
            })
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }
}
