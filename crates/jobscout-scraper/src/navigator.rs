//! Per-site navigation: the state machine each crawl drives.
//!
//! A navigator owns one site tab and walks it through
//! `Unauthenticated → Authenticated → Searching → ListPage(n) → Done`.
//! The executor calls the primitives; the navigator keeps the state and
//! the site-specific selectors. Every primitive may fail — the executor
//! decides which ones to wrap in the retry policy and pairs them with the
//! site's [`recover`](SiteNavigator::recover) action.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;
use crate::parse::max_page;

/// Where a navigator currently stands in its crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Unauthenticated,
    Authenticated,
    Searching,
    /// Iterating the result list; the payload is the 1-based page number.
    ListPage(u32),
    /// The result list is exhausted.
    Done,
}

/// One job posting as extracted from a list page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
    /// Raw detail HTML for downstream enrichment; not interpreted here.
    pub html: String,
}

/// The navigation capability one site variant provides.
#[async_trait]
pub trait SiteNavigator: Send {
    /// Canonical site name; also the registry key.
    fn site(&self) -> &'static str;

    fn state(&self) -> NavState;

    /// Result-list page size the site paginates with.
    fn page_size(&self) -> u32;

    /// Drives the site's auth flow. Transitions to
    /// [`NavState::Authenticated`] only on confirmed success.
    async fn login(&mut self) -> Result<(), ScrapeError>;

    /// Issues a site search and lands on the first result page.
    async fn search(&mut self, keyword: &str, location: Option<&str>)
        -> Result<(), ScrapeError>;

    /// Total result count as reported by the site.
    async fn total_results(&mut self) -> Result<u32, ScrapeError>;

    /// Number of job cards currently rendered on the list page.
    async fn list_len(&mut self) -> Result<usize, ScrapeError>;

    /// Brings the `index`-th job card into view on sites that lazy-render
    /// their lists.
    async fn scroll_jobs_list(&mut self, index: usize) -> Result<(), ScrapeError>;

    /// Extracts the `index`-th job card (opening its detail view).
    async fn job_summary(&mut self, index: usize) -> Result<JobSummary, ScrapeError>;

    /// Advances to the next list page. `Ok(false)` signals list
    /// exhaustion, not an error.
    async fn click_next_page(&mut self) -> Result<bool, ScrapeError>;

    /// Site-specific recovery action used between retry attempts: dismiss
    /// whatever interstitial is blocking and settle the page.
    async fn recover(&mut self) -> Result<(), ScrapeError>;

    /// Extracts a single already-known posting URL.
    ///
    /// # Errors
    ///
    /// Sites without single-URL support return
    /// [`ScrapeError::UnsupportedUrl`].
    async fn process_url(&mut self, url: &str) -> Result<JobSummary, ScrapeError> {
        Err(ScrapeError::UnsupportedUrl {
            url: url.to_string(),
        })
    }

    /// Releases the underlying tab.
    async fn close(&mut self) -> Result<(), ScrapeError>;
}

/// Pages forward to `start_page` without extracting, so a resumed crawl
/// skips work a prior run already did.
///
/// Clicks [`click_next_page`](SiteNavigator::click_next_page) until
/// `start_page` is reached, the list ends, or a click fails; returns the
/// page actually reached. When the computed page count is below
/// `start_page` (the site shrank since the last run), no clicks are
/// attempted and the navigator stays on page 1.
pub async fn fast_forward_page(
    nav: &mut (dyn SiteNavigator + Send),
    start_page: u32,
    total_results: u32,
    page_size: u32,
) -> u32 {
    if start_page <= 1 {
        return 1;
    }
    let last = max_page(total_results, page_size);
    if last < start_page {
        tracing::info!(
            site = nav.site(),
            start_page,
            last_page = last,
            "resume page no longer exists — restarting from page 1"
        );
        return 1;
    }

    let mut reached = 1;
    while reached < start_page {
        match nav.click_next_page().await {
            Ok(true) => reached += 1,
            Ok(false) => {
                tracing::warn!(
                    site = nav.site(),
                    reached,
                    start_page,
                    "list ended before the resume page"
                );
                break;
            }
            Err(err) => {
                tracing::warn!(
                    site = nav.site(),
                    reached,
                    start_page,
                    error = %err,
                    "page-forward click failed — resuming from the page reached"
                );
                break;
            }
        }
    }
    reached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedNavigator;

    #[tokio::test]
    async fn fast_forward_clicks_exactly_to_the_start_page() {
        // start_page=3, total=100, size=10: exactly 2 clicks, lands on 3.
        let mut nav = ScriptedNavigator::new(100, 10);
        let reached = fast_forward_page(&mut nav, 3, 100, 10).await;
        assert_eq!(reached, 3);
        assert_eq!(nav.next_page_clicks(), 2);
    }

    #[tokio::test]
    async fn fast_forward_refuses_out_of_range_start_page() {
        // total=20, size=10 → 2 pages; start_page=5 means zero clicks, page 1.
        let mut nav = ScriptedNavigator::new(20, 10);
        let reached = fast_forward_page(&mut nav, 5, 20, 10).await;
        assert_eq!(reached, 1);
        assert_eq!(nav.next_page_clicks(), 0);
    }

    #[tokio::test]
    async fn fast_forward_stops_at_the_page_reached_when_a_click_fails() {
        let mut nav = ScriptedNavigator::new(100, 10);
        nav.fail_next_page_after(1);
        let reached = fast_forward_page(&mut nav, 5, 100, 10).await;
        assert_eq!(reached, 2, "one successful click, then the failure stops us");
    }

    #[tokio::test]
    async fn fast_forward_stops_on_list_exhaustion() {
        // The site claims 100 results but the list actually ends at page 2.
        let mut nav = ScriptedNavigator::new(100, 10);
        nav.exhaust_after_page(2);
        let reached = fast_forward_page(&mut nav, 6, 100, 10).await;
        assert_eq!(reached, 2);
    }

    #[tokio::test]
    async fn fast_forward_is_a_no_op_for_page_one() {
        let mut nav = ScriptedNavigator::new(100, 10);
        assert_eq!(fast_forward_page(&mut nav, 0, 100, 10).await, 1);
        assert_eq!(fast_forward_page(&mut nav, 1, 100, 10).await, 1);
        assert_eq!(nav.next_page_clicks(), 0);
    }
}
