//! InfoJobs navigator.
//!
//! Login occasionally demands a security code mailed to the account
//! address, consumed here through the external verification-code source.
//! Result counts come localized ("1.234 ofertas"). Cards link to full
//! detail pages, so extraction opens the posting and navigates back to
//! the list afterwards. Single-URL reprocessing is supported.

use std::sync::Arc;

use async_trait::async_trait;

use jobscout_core::app_config::SiteCredentials;

use crate::browser::{BrowserPage, VerificationCodeSource};
use crate::error::ScrapeError;
use crate::navigator::{JobSummary, NavState, SiteNavigator};
use crate::parse::parse_result_count;

const SITE: &str = "Infojobs";
const PAGE_SIZE: u32 = 20;

const LOGIN_URL: &str = "https://www.infojobs.net/candidate/candidate-login/candidate-login.xhtml";
const SEARCH_URL: &str = "https://www.infojobs.net/jobsearch/search-results/list.xhtml";

const EMAIL_INPUT: &str = "#email";
const PASSWORD_INPUT: &str = "#password";
const LOGIN_SUBMIT: &str = "#idSubmitButton";
const VERIFICATION_INPUT: &str = "input[name='securityCode']";
const VERIFICATION_SUBMIT: &str = "#idValidateButton";
/// Candidate menu only renders for a signed-in session.
const ACCOUNT_MARKER: &str = ".candidate-menu";
const COOKIE_ACCEPT: &str = "#didomi-notice-agree-button";

const RESULT_COUNT: &str = "h1.main-title";
const JOB_CARD: &str = ".ij-OfferCardContent";
const CARD_TITLE_LINK: &str = ".ij-OfferCardContent-description-title-link";
const NEXT_BUTTON: &str = "button[data-test='pagination-next']";
const DETAIL_TITLE: &str = "#prefijoPuesto";
const DETAIL_COMPANY: &str = ".link-title-offer";
const DETAIL_LOCATION: &str = "#prefijoPoblacion";

pub struct InfojobsNavigator {
    page: Arc<dyn BrowserPage>,
    credentials: SiteCredentials,
    codes: Arc<dyn VerificationCodeSource>,
    state: NavState,
    current_page: u32,
}

impl InfojobsNavigator {
    #[must_use]
    pub fn new(
        page: Arc<dyn BrowserPage>,
        credentials: SiteCredentials,
        codes: Arc<dyn VerificationCodeSource>,
    ) -> Self {
        Self {
            page,
            credentials,
            codes,
            state: NavState::Unauthenticated,
            current_page: 1,
        }
    }

    fn card_title_selector(index: usize) -> String {
        format!("{JOB_CARD}:nth-child({}) {CARD_TITLE_LINK}", index + 1)
    }

    async fn accept_cookies_if_asked(&self) {
        let banner = self
            .page
            .get_elements(COOKIE_ACCEPT)
            .await
            .unwrap_or_default();
        if !banner.is_empty() {
            if let Err(err) = self.page.click(COOKIE_ACCEPT).await {
                tracing::debug!(error = %err, "cookie banner accept failed");
            }
        }
    }

    /// Completes the mailed-security-code step when the site interposes it.
    async fn complete_verification_if_asked(&self) -> Result<(), ScrapeError> {
        let inputs = self.page.get_elements(VERIFICATION_INPUT).await?;
        if inputs.is_empty() {
            return Ok(());
        }
        tracing::info!(site = SITE, "security code requested — fetching from mail");
        let code = self.codes.fetch_verification_code().await?;
        self.page.send_keys(VERIFICATION_INPUT, &code).await?;
        self.page.click(VERIFICATION_SUBMIT).await?;
        Ok(())
    }
}

#[async_trait]
impl SiteNavigator for InfojobsNavigator {
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
        self.accept_cookies_if_asked().await;

        self.page.send_keys(EMAIL_INPUT, email).await?;
        self.page.send_keys(PASSWORD_INPUT, password).await?;
        self.page.click(LOGIN_SUBMIT).await?;
        self.page.wait_until_page_loaded().await?;

        self.complete_verification_if_asked().await?;

        match self.page.wait_until_present(ACCOUNT_MARKER).await {
            Ok(()) => {
                self.state = NavState::Authenticated;
                Ok(())
            }
            Err(ScrapeError::WaitTimeout { .. }) => Err(ScrapeError::AuthFailed {
                site: SITE.to_string(),
                reason: "candidate menu never appeared after submit".to_string(),
            }),
            Err(err) => Err(err),
        }
    }

    async fn search(&mut self, keyword: &str, location: Option<&str>) -> Result<(), ScrapeError> {
        let mut params = vec![("keyword", keyword)];
        if let Some(location) = location {
            params.push(("location", location));
        }
        let url = reqwest::Url::parse_with_params(SEARCH_URL, &params).map_err(|e| {
            ScrapeError::UnsupportedUrl {
                url: format!("{SEARCH_URL}?keyword={keyword} ({e})"),
            }
        })?;

        self.page.load_page(url.as_str()).await?;
        self.page.wait_until_page_loaded().await?;
        self.accept_cookies_if_asked().await;
        self.page.wait_until_present(JOB_CARD).await?;
        self.current_page = 1;
        self.state = NavState::Searching;
        Ok(())
    }

    async fn total_results(&mut self) -> Result<u32, ScrapeError> {
        // e.g. "1.234 ofertas de trabajo de rust"
        let text = self.page.get_text(RESULT_COUNT).await?;
        parse_result_count(&text)
    }

    async fn list_len(&mut self) -> Result<usize, ScrapeError> {
        let cards = self.page.get_elements(JOB_CARD).await?;
        self.state = NavState::ListPage(self.current_page);
        Ok(cards.len())
    }

    async fn scroll_jobs_list(&mut self, index: usize) -> Result<(), ScrapeError> {
        self.page
            .execute_script(&format!(
                "document.querySelectorAll(\"{JOB_CARD}\")[{index}]?.scrollIntoView(true);"
            ))
            .await
    }

    async fn job_summary(&mut self, index: usize) -> Result<JobSummary, ScrapeError> {
        self.page.click(&Self::card_title_selector(index)).await?;
        self.page.wait_until_present(DETAIL_TITLE).await?;

        let summary = self.extract_detail().await?;

        // Return to the list page we came from; pagination is URL-driven,
        // so the browser history lands back on the same page number.
        self.page.execute_script("history.back();").await?;
        self.page.wait_until_present(JOB_CARD).await?;

        Ok(summary)
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
        self.accept_cookies_if_asked().await;
        self.page
            .execute_script("window.scrollTo(0, document.body.scrollHeight);")
            .await
    }

    async fn process_url(&mut self, url: &str) -> Result<JobSummary, ScrapeError> {
        self.page.load_page(url).await?;
        self.page.wait_until_page_loaded().await?;
        self.accept_cookies_if_asked().await;
        self.page.wait_until_present(DETAIL_TITLE).await?;
        self.extract_detail().await
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        self.page.close().await
    }
}

impl InfojobsNavigator {
    async fn extract_detail(&self) -> Result<JobSummary, ScrapeError> {
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
}
