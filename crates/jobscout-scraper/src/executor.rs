//! Per-crawler execution: one navigator plus the storage and persistence
//! collaborators, turned into persisted job records.
//!
//! `execute` runs one full keyword-crawl cycle per configured keyword:
//! freshness skip, search, fast-forward to the resume page, then the page
//! loop — extract, dedup-insert, flush progress after every page. State is
//! flushed at each page boundary, so a kill at any instant resumes at the
//! last completed page. The shutdown signal is checked between keywords
//! and between pages, never only at the top of a run.
//!
//! Flaky navigation primitives are wrapped in the retry policy with the
//! site's recovery action. Both closures lock the same navigator handle;
//! the retry layer itself knows nothing about navigators.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use jobscout_core::{AppConfig, CrawlerConfig};
use jobscout_state::StateStore;

use crate::browser::{BrowserFactory, VerificationCodeSource};
use crate::error::ScrapeError;
use crate::navigator::{fast_forward_page, JobSummary, NavState, SiteNavigator};
use crate::parse::max_page;
use crate::retry::{retry_or_suppress, retry_with_recovery, RetryOptions};
use crate::sites;
use crate::store::{job_key, JobStore};

/// Totals from one `execute` call, for end-of-run reporting.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub crawler: String,
    pub keywords_run: usize,
    pub keywords_skipped: usize,
    pub keywords_failed: usize,
    pub jobs_seen: u64,
    pub jobs_inserted: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct PageStats {
    seen: u64,
    inserted: u64,
}

/// Drives one crawler. Exactly one executor is active per crawler name at
/// any time; the scheduler runs them sequentially.
pub struct Executor {
    crawler: CrawlerConfig,
    navigator: tokio::sync::Mutex<Box<dyn SiteNavigator + Send>>,
    store: Arc<dyn JobStore>,
    state: Arc<StateStore>,
    retry: RetryOptions,
    skip_fresh: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Executor {
    #[must_use]
    pub fn new(
        crawler: CrawlerConfig,
        navigator: Box<dyn SiteNavigator + Send>,
        store: Arc<dyn JobStore>,
        state: Arc<StateStore>,
        retry: RetryOptions,
        skip_fresh: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            crawler,
            navigator: tokio::sync::Mutex::new(navigator),
            store,
            state,
            retry,
            skip_fresh,
            shutdown,
        }
    }

    #[must_use]
    pub fn crawler_name(&self) -> &str {
        &self.crawler.name
    }

    /// One-time per-process setup: authenticate the site session.
    ///
    /// A no-op when the navigator is already past `Unauthenticated`, so a
    /// warm tab survives across scheduled runs.
    ///
    /// # Errors
    ///
    /// Auth failures are fatal for this crawler's run; the caller moves on
    /// to the next crawler.
    pub async fn execute_preload(&mut self) -> Result<(), ScrapeError> {
        if self.navigator.get_mut().state() != NavState::Unauthenticated {
            return Ok(());
        }
        let nav = &self.navigator;
        retry_with_recovery(
            self.retry,
            "login",
            move || async move { nav.lock().await.login().await },
            move || async move { nav.lock().await.recover().await },
        )
        .await
    }

    /// Runs one full crawl cycle over every configured keyword.
    ///
    /// A keyword whose retries exhaust is recorded via the state store and
    /// the cycle continues with the next keyword; only cancellation and
    /// persistence failures abort the run.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::Cancelled`] when the shutdown signal fires, or a
    /// state/store error.
    pub async fn execute(&mut self) -> Result<RunReport, ScrapeError> {
        let keywords = self.crawler.keywords.clone();
        let location = self.crawler.location.clone();
        let mut report = RunReport {
            crawler: self.crawler.name.clone(),
            ..RunReport::default()
        };

        for keyword in &keywords {
            self.check_cancelled()?;

            if self
                .state
                .should_skip_keyword(&self.crawler.name, keyword, self.skip_fresh)
            {
                tracing::info!(
                    crawler = %self.crawler.name,
                    keyword,
                    "keyword completed recently — skipping"
                );
                report.keywords_skipped += 1;
                continue;
            }

            match self.crawl_keyword(keyword, location.as_deref()).await {
                Ok(stats) => {
                    report.keywords_run += 1;
                    report.jobs_seen += stats.seen;
                    report.jobs_inserted += stats.inserted;
                }
                Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
                Err(err @ (ScrapeError::State(_) | ScrapeError::Store(_))) => return Err(err),
                Err(err) => {
                    self.state
                        .record_failure(&self.crawler.name, keyword, &err.to_string())?;
                    tracing::error!(
                        crawler = %self.crawler.name,
                        keyword,
                        error = %err,
                        "keyword crawl failed — continuing with next keyword"
                    );
                    report.keywords_failed += 1;
                }
            }
        }

        let merged = self.store.merge_duplicates().await?;
        if merged > 0 {
            tracing::info!(crawler = %self.crawler.name, merged, "merged duplicate jobs");
        }

        Ok(report)
    }

    /// Releases the navigator's tab.
    pub async fn close(&mut self) {
        if let Err(err) = self.navigator.get_mut().close().await {
            tracing::warn!(crawler = %self.crawler.name, error = %err, "tab close failed");
        }
    }

    async fn crawl_keyword(
        &mut self,
        keyword: &str,
        location: Option<&str>,
    ) -> Result<PageStats, ScrapeError> {
        let crawler = self.crawler.name.clone();

        let nav = &self.navigator;
        retry_with_recovery(
            self.retry,
            "search",
            move || async move { nav.lock().await.search(keyword, location).await },
            move || async move { nav.lock().await.recover().await },
        )
        .await?;

        let nav = &self.navigator;
        let total = retry_with_recovery(
            self.retry,
            "total-results",
            move || async move { nav.lock().await.total_results().await },
            move || async move { nav.lock().await.recover().await },
        )
        .await?;

        let page_size = self.navigator.get_mut().page_size();
        let last = max_page(total, page_size);
        tracing::info!(crawler = %crawler, keyword, total, pages = last, "search issued");

        let mut stats = PageStats::default();
        if total == 0 {
            self.state.mark_completed(&crawler, keyword)?;
            return Ok(stats);
        }

        // A prior run's progress becomes this run's starting page.
        let resume = self.state.resume_page(&crawler, keyword);
        let mut page = if resume > 1 {
            let reached =
                fast_forward_page(self.navigator.get_mut().as_mut(), resume, total, page_size)
                    .await;
            tracing::info!(crawler = %crawler, keyword, resume, reached, "fast-forwarded");
            reached
        } else {
            1
        };

        loop {
            self.check_cancelled()?;

            let page_stats = self.scrape_list_page(keyword).await?;
            stats.seen += page_stats.seen;
            stats.inserted += page_stats.inserted;

            self.state.record_seen(&crawler, keyword, page_stats.seen)?;
            self.state.update_state(&crawler, keyword, page)?;

            if page >= last {
                break;
            }
            let nav = &self.navigator;
            let advanced = retry_with_recovery(
                self.retry,
                "next-page",
                move || async move { nav.lock().await.click_next_page().await },
                move || async move { nav.lock().await.recover().await },
            )
            .await?;
            if !advanced {
                // The site reported fewer pages than the count implied.
                break;
            }
            page += 1;
        }

        self.state.mark_completed(&crawler, keyword)?;
        Ok(stats)
    }

    async fn scrape_list_page(&mut self, keyword: &str) -> Result<PageStats, ScrapeError> {
        let nav = &self.navigator;

        let len = retry_with_recovery(
            self.retry,
            "list-page",
            move || async move { nav.lock().await.list_len().await },
            move || async move { nav.lock().await.recover().await },
        )
        .await?;

        let mut stats = PageStats::default();
        for index in 0..len {
            if let Err(err) = nav.lock().await.scroll_jobs_list(index).await {
                tracing::debug!(keyword, index, error = %err, "list scroll failed");
            }

            // One unrenderable card is not worth failing the keyword over:
            // count it as seen and move on.
            let summary = retry_or_suppress(
                self.retry,
                "job-card",
                move || async move { nav.lock().await.job_summary(index).await },
                move || async move { nav.lock().await.recover().await },
            )
            .await?;
            stats.seen += 1;

            let Some(summary) = summary else { continue };
            let key = job_key(&summary.url);
            if self.store.job_exists(&key).await? {
                continue;
            }
            if self.store.insert_job(&summary).await?.is_some() {
                stats.inserted += 1;
            }
        }
        Ok(stats)
    }

    fn check_cancelled(&self) -> Result<(), ScrapeError> {
        if *self.shutdown.borrow() {
            Err(ScrapeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Dispatches a single already-known posting URL to the owning site's
/// handler. Used for manual reprocessing.
///
/// # Errors
///
/// [`ScrapeError::UnsupportedUrl`] when no site owns the host or the
/// owning site has no single-URL support; login and extraction errors
/// otherwise.
pub async fn process_page_url(
    url: &str,
    app: &AppConfig,
    browser: &dyn BrowserFactory,
    codes: Arc<dyn VerificationCodeSource>,
) -> Result<JobSummary, ScrapeError> {
    let site = sites::site_for_url(url).ok_or_else(|| ScrapeError::UnsupportedUrl {
        url: url.to_string(),
    })?;

    let page = browser.open_page().await?;
    let mut nav = sites::build_navigator(site, page, app, codes)?;

    let result = async {
        nav.login().await?;
        nav.process_url(url).await
    }
    .await;

    if let Err(err) = nav.close().await {
        tracing::debug!(site, error = %err, "tab close failed after URL reprocess");
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testutil::{MemStore, ScriptedNavigator};

    fn crawler_config(keywords: &[&str]) -> CrawlerConfig {
        CrawlerConfig {
            name: "Scripted".to_string(),
            interval: "1h".to_string(),
            windows: Vec::new(),
            ignore_auto_run: false,
            close_tab: false,
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            location: Some("Remote".to_string()),
        }
    }

    fn state_store(dir: &tempfile::TempDir) -> Arc<StateStore> {
        Arc::new(StateStore::open(dir.path().join("state.json")).unwrap())
    }

    fn executor(
        nav: ScriptedNavigator,
        store: Arc<MemStore>,
        state: Arc<StateStore>,
        shutdown: watch::Receiver<bool>,
    ) -> Executor {
        Executor::new(
            crawler_config(&["rust"]),
            Box::new(nav),
            store,
            state,
            RetryOptions::new(3, Duration::from_millis(0)),
            Duration::from_secs(3_600),
            shutdown,
        )
    }

    #[tokio::test]
    async fn full_run_extracts_every_page_and_flushes_progress() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_store(&dir);
        let store = Arc::new(MemStore::new());
        let (_tx, rx) = watch::channel(false);

        // 25 results at 10 per page → pages of 10, 10, 5.
        let mut exec = executor(ScriptedNavigator::new(25, 10), Arc::clone(&store), Arc::clone(&state), rx);
        let report = exec.execute().await.unwrap();

        assert_eq!(report.keywords_run, 1);
        assert_eq!(report.jobs_seen, 25);
        assert_eq!(report.jobs_inserted, 25);
        assert_eq!(store.len(), 25);
        assert_eq!(store.merge_calls(), 1);

        let ks = state.keyword_state("Scripted", "rust").unwrap();
        assert_eq!(ks.last_page, 3);
        assert_eq!(ks.seen_count, 25);
        assert!(ks.completed_at.is_some());
        assert!(!ks.failed);
    }

    #[tokio::test]
    async fn resumed_run_fast_forwards_past_processed_pages() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_store(&dir);
        let store = Arc::new(MemStore::new());
        let (_tx, rx) = watch::channel(false);

        // A prior run got through page 1 and died on page 2.
        state.update_state("Scripted", "rust", 2).unwrap();

        let mut exec = executor(ScriptedNavigator::new(25, 10), Arc::clone(&store), Arc::clone(&state), rx);
        let report = exec.execute().await.unwrap();

        // Pages 2 and 3 only: 10 + 5 jobs.
        assert_eq!(report.jobs_seen, 15);
        assert_eq!(store.len(), 15);
        assert_eq!(state.keyword_state("Scripted", "rust").unwrap().last_page, 3);
    }

    #[tokio::test]
    async fn second_run_within_freshness_window_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_store(&dir);
        let store = Arc::new(MemStore::new());
        let (_tx, rx) = watch::channel(false);

        let mut exec = executor(ScriptedNavigator::new(25, 10), Arc::clone(&store), Arc::clone(&state), rx.clone());
        exec.execute().await.unwrap();
        let first = state.keyword_state("Scripted", "rust").unwrap();

        let mut exec = executor(ScriptedNavigator::new(25, 10), Arc::clone(&store), Arc::clone(&state), rx);
        let report = exec.execute().await.unwrap();

        assert_eq!(report.keywords_skipped, 1);
        assert_eq!(report.jobs_seen, 0);
        let second = state.keyword_state("Scripted", "rust").unwrap();
        assert_eq!(second.last_page, first.last_page);
        assert_eq!(second.seen_count, first.seen_count);
    }

    #[tokio::test]
    async fn transient_card_failures_are_retried_with_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_store(&dir);
        let store = Arc::new(MemStore::new());
        let (_tx, rx) = watch::channel(false);

        let mut nav = ScriptedNavigator::new(5, 10);
        nav.fail_job_summaries(2);
        let recoveries = nav.recovery_counter();

        let mut exec = executor(nav, Arc::clone(&store), state, rx);
        let report = exec.execute().await.unwrap();

        assert_eq!(report.jobs_inserted, 5, "retries must recover every card");
        assert!(recoveries.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn exhausted_search_records_a_keyword_failure_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_store(&dir);
        let store = Arc::new(MemStore::new());
        let (_tx, rx) = watch::channel(false);

        let mut nav = ScriptedNavigator::new(25, 10);
        nav.fail_search();

        let mut exec = executor(nav, Arc::clone(&store), Arc::clone(&state), rx);
        let report = exec.execute().await.unwrap();

        assert_eq!(report.keywords_failed, 1);
        assert_eq!(report.keywords_run, 0);
        let failures = state.failure_summary("Scripted");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].keyword, "rust");
        assert!(failures[0].last_error.is_some());
    }

    #[tokio::test]
    async fn shutdown_before_the_run_cancels_between_keywords() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_store(&dir);
        let store = Arc::new(MemStore::new());
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let mut exec = executor(ScriptedNavigator::new(25, 10), store, state, rx);
        let result = exec.execute().await;
        assert!(matches!(result, Err(ScrapeError::Cancelled)));
    }

    #[tokio::test]
    async fn preload_logs_in_once_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_store(&dir);
        let store = Arc::new(MemStore::new());
        let (_tx, rx) = watch::channel(false);

        let nav = ScriptedNavigator::new(5, 10);
        let logins = nav.login_counter();

        let mut exec = executor(nav, store, state, rx);
        exec.execute_preload().await.unwrap();
        exec.execute_preload().await.unwrap();
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_results_completes_without_touching_pages() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_store(&dir);
        let store = Arc::new(MemStore::new());
        let (_tx, rx) = watch::channel(false);

        let mut exec = executor(ScriptedNavigator::new(0, 10), store, Arc::clone(&state), rx);
        let report = exec.execute().await.unwrap();

        assert_eq!(report.jobs_seen, 0);
        let ks = state.keyword_state("Scripted", "rust").unwrap();
        assert_eq!(ks.last_page, 0);
        assert!(ks.completed_at.is_some());
    }
}
