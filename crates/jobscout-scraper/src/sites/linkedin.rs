//! LinkedIn jobs navigator.
//!
//! Search results render as a lazy list on the left with a detail pane on
//! the right, so extraction clicks each card and reads the pane without
//! leaving the list page. The site injects interstitial modals at will;
//! the recovery action dismisses them and re-settles the list scroll.

use std::sync::Arc;

use async_trait::async_trait;

use jobscout_core::app_config::SiteCredentials;

use crate::browser::BrowserPage;
use crate::error::ScrapeError;
use crate::navigator::{JobSummary, NavState, SiteNavigator};
use crate::parse::parse_result_count;

const SITE: &str = "Linkedin";
const PAGE_SIZE: u32 = 25;

const LOGIN_URL: &str = "https://www.linkedin.com/login";
const SEARCH_URL: &str = "https://www.linkedin.com/jobs/search/";

const EMAIL_INPUT: &str = "#username";
const PASSWORD_INPUT: &str = "#password";
const LOGIN_SUBMIT: &str = "button[type='submit']";
/// Present on every authenticated page; its appearance confirms login.
const GLOBAL_NAV: &str = "#global-nav";

const JOB_CARD: &str = "li.jobs-search-results__list-item";
const RESULT_COUNT: &str = ".jobs-search-results-list__subtitle";
const NEXT_BUTTON: &str = "button[aria-label='View next page']";
const DETAIL_TITLE: &str = ".job-details-jobs-unified-top-card__job-title";
const DETAIL_COMPANY: &str = ".job-details-jobs-unified-top-card__company-name";
const DETAIL_LOCATION: &str =
    ".job-details-jobs-unified-top-card__primary-description-container span";
const MODAL_DISMISS: &str = "button[aria-label='Dismiss']";

pub struct LinkedinNavigator {
    page: Arc<dyn BrowserPage>,
    credentials: SiteCredentials,
    state: NavState,
    current_page: u32,
}

impl LinkedinNavigator {
    #[must_use]
    pub fn new(page: Arc<dyn BrowserPage>, credentials: SiteCredentials) -> Self {
        Self {
            page,
            credentials,
            state: NavState::Unauthenticated,
            current_page: 1,
        }
    }

    fn card_selector(index: usize) -> String {
        format!("{JOB_CARD}:nth-child({})", index + 1)
    }
}

#[async_trait]
impl SiteNavigator for LinkedinNavigator {
    fn site(&self) -> &'static str {
        SITE
    }

    fn state(&self) -> NavState {
        self.state
    }

    fn page_size(&self) -> u32 {
        PAGE_SIZE
    }

    async fn login(&mut self) -> Result<(), ScrapeError> {
        let (Some(email), Some(password)) =
            (&self.credentials.email, &self.credentials.password)
        else {
            return Err(ScrapeError::MissingCredentials {
                site: SITE.to_string(),
            });
        };

        self.page.load_page(LOGIN_URL).await?;
        self.page.wait_until_page_loaded().await?;
        self.page.send_keys(EMAIL_INPUT, email).await?;
        self.page.send_keys(PASSWORD_INPUT, password).await?;
        self.page.click(LOGIN_SUBMIT).await?;

        match self.page.wait_until_present(GLOBAL_NAV).await {
            Ok(()) => {
                self.state = NavState::Authenticated;
                Ok(())
            }
            Err(ScrapeError::WaitTimeout { .. }) => Err(ScrapeError::AuthFailed {
                site: SITE.to_string(),
                reason: "feed never loaded after submit — bad credentials or a checkpoint"
                    .to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    async fn search(&mut self, keyword: &str, location: Option<&str>) -> Result<(), ScrapeError> {
        let mut params = vec![("keywords", keyword)];
        if let Some(location) = location {
            params.push(("location", location));
        }
        let url = reqwest::Url::parse_with_params(SEARCH_URL, &params).map_err(|e| {
            ScrapeError::UnsupportedUrl {
                url: format!("{SEARCH_URL}?keywords={keyword} ({e})"),
            }
        })?;

        self.page.load_page(url.as_str()).await?;
        self.page.wait_until_page_loaded().await?;
        self.page.wait_until_present(JOB_CARD).await?;
        self.current_page = 1;
        self.state = NavState::Searching;
        Ok(())
    }

    async fn total_results(&mut self) -> Result<u32, ScrapeError> {
        let text = self.page.get_text(RESULT_COUNT).await?;
        parse_result_count(&text)
    }

    async fn list_len(&mut self) -> Result<usize, ScrapeError> {
        let cards = self.page.get_elements(JOB_CARD).await?;
        self.state = NavState::ListPage(self.current_page);
        Ok(cards.len())
    }

    async fn scroll_jobs_list(&mut self, index: usize) -> Result<(), ScrapeError> {
        // Cards below the fold only materialize once scrolled to.
        self.page
            .execute_script(&format!(
                "document.querySelectorAll(\"{JOB_CARD}\")[{index}]?.scrollIntoView(true);"
            ))
            .await
    }

    async fn job_summary(&mut self, index: usize) -> Result<JobSummary, ScrapeError> {
        self.page.click(&Self::card_selector(index)).await?;
        self.page.wait_until_present(DETAIL_TITLE).await?;

        let title = self.page.get_text(DETAIL_TITLE).await?;
        let company = self.page.get_text(DETAIL_COMPANY).await?;
        let location = self.page.get_text(DETAIL_LOCATION).await?;
        let url = self.page.current_url().await?;
        let html = self.page.page_html().await?;

        Ok(JobSummary {
            title: title.trim().to_string(),
            company: company.trim().to_string(),
            location: location.trim().to_string(),
            url,
            html,
        })
    }

    async fn click_next_page(&mut self) -> Result<bool, ScrapeError> {
        if self.page.get_elements(NEXT_BUTTON).await?.is_empty() {
            self.state = NavState::Done;
            return Ok(false);
        }
        self.page.click(NEXT_BUTTON).await?;
        self.page.wait_until_present(JOB_CARD).await?;
        self.current_page += 1;
        self.state = NavState::ListPage(self.current_page);
        Ok(true)
    }

    async fn recover(&mut self) -> Result<(), ScrapeError> {
        let modals = self
            .page
            .get_elements(MODAL_DISMISS)
            .await
            .unwrap_or_default();
        if !modals.is_empty() {
            if let Err(err) = self.page.click(MODAL_DISMISS).await {
                tracing::debug!(error = %err, "modal dismiss failed during recovery");
            }
        }
        self.page
            .execute_script("window.scrollTo(0, document.body.scrollHeight);")
            .await
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        self.page.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakePage;

    fn credentials() -> SiteCredentials {
        SiteCredentials {
            email: Some("user@example.com".to_string()),
            password: Some("hunter2".to_string()),
        }
    }

    #[tokio::test]
    async fn login_confirms_on_the_global_nav() {
        let page = Arc::new(FakePage::new());
        page.set_present(GLOBAL_NAV);

        let mut nav = LinkedinNavigator::new(Arc::<FakePage>::clone(&page), credentials());
        nav.login().await.unwrap();

        assert_eq!(nav.state(), NavState::Authenticated);
        assert!(page.clicks().contains(&LOGIN_SUBMIT.to_string()));
    }

    #[tokio::test]
    async fn login_without_the_global_nav_is_an_auth_failure() {
        let page = Arc::new(FakePage::new());
        let mut nav = LinkedinNavigator::new(page, credentials());

        let err = nav.login().await.unwrap_err();
        assert!(matches!(err, ScrapeError::AuthFailed { ref site, .. } if site == SITE));
        assert_eq!(nav.state(), NavState::Unauthenticated);
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_touching_the_page() {
        let page = Arc::new(FakePage::new());
        let mut nav = LinkedinNavigator::new(Arc::<FakePage>::clone(&page), SiteCredentials::default());

        let err = nav.login().await.unwrap_err();
        assert!(matches!(err, ScrapeError::MissingCredentials { .. }));
        assert!(page.loads().is_empty());
    }

    #[tokio::test]
    async fn total_results_parses_the_subtitle_count() {
        let page = Arc::new(FakePage::new());
        page.set_text(RESULT_COUNT, "12,345 results");

        let mut nav = LinkedinNavigator::new(page, credentials());
        assert_eq!(nav.total_results().await.unwrap(), 12_345);
    }

    #[tokio::test]
    async fn single_url_reprocessing_is_unsupported() {
        let page = Arc::new(FakePage::new());
        let mut nav = LinkedinNavigator::new(page, credentials());

        let err = nav
            .process_url("https://www.linkedin.com/jobs/view/42")
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::UnsupportedUrl { .. }));
    }
}
