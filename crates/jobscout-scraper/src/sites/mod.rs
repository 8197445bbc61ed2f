//! Site variants and their dispatch registry.
//!
//! Each supported job site is one module with its own selectors and
//! navigation quirks, behind the shared [`SiteNavigator`] trait. Dispatch
//! is by crawler name (case-insensitive, canonical casing preserved) or,
//! for single-URL reprocessing, by posting host.

mod infojobs;
mod linkedin;

use std::sync::Arc;

use async_trait::async_trait;

use jobscout_core::{AppConfig, CrawlerConfig};

pub use infojobs::InfojobsNavigator;
pub use linkedin::LinkedinNavigator;

use crate::browser::{BrowserFactory, BrowserPage, VerificationCodeSource};
use crate::error::ScrapeError;
use crate::navigator::SiteNavigator;

/// Canonical names of every site with a navigator variant.
pub const SUPPORTED_SITES: &[&str] = &["Infojobs", "Linkedin"];

/// Resolves a crawler/site name to its canonical casing.
#[must_use]
pub fn canonical_site(name: &str) -> Option<&'static str> {
    SUPPORTED_SITES
        .iter()
        .find(|site| site.eq_ignore_ascii_case(name))
        .copied()
}

/// Which site owns a posting URL, by host.
#[must_use]
pub fn site_for_url(url: &str) -> Option<&'static str> {
    let host = url
        .split_once("://")
        .map_or(url, |(_, rest)| rest)
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    if host.contains("infojobs.") {
        Some("Infojobs")
    } else if host.contains("linkedin.") {
        Some("Linkedin")
    } else {
        None
    }
}

/// Constructs the navigator variant for `name` over the given tab.
///
/// # Errors
///
/// Returns [`ScrapeError::UnknownCrawler`] for names with no variant.
pub fn build_navigator(
    name: &str,
    page: Arc<dyn BrowserPage>,
    app: &AppConfig,
    codes: Arc<dyn VerificationCodeSource>,
) -> Result<Box<dyn SiteNavigator + Send>, ScrapeError> {
    match canonical_site(name) {
        Some("Infojobs") => Ok(Box::new(InfojobsNavigator::new(
            page,
            app.infojobs.clone(),
            codes,
        ))),
        Some("Linkedin") => Ok(Box::new(LinkedinNavigator::new(page, app.linkedin.clone()))),
        _ => Err(ScrapeError::UnknownCrawler {
            name: name.to_string(),
        }),
    }
}

/// Builds a ready navigator for a crawler, tab included.
///
/// The scheduler and executors depend on this seam rather than on the
/// concrete registry, so tests can substitute scripted navigators.
#[async_trait]
pub trait NavigatorFactory: Send + Sync {
    async fn build(
        &self,
        crawler: &CrawlerConfig,
    ) -> Result<Box<dyn SiteNavigator + Send>, ScrapeError>;
}

/// Production factory: one fresh browser tab per navigator, dispatched
/// through [`build_navigator`].
pub struct SiteRegistry {
    app: AppConfig,
    browser: Arc<dyn BrowserFactory>,
    codes: Arc<dyn VerificationCodeSource>,
}

impl SiteRegistry {
    #[must_use]
    pub fn new(
        app: AppConfig,
        browser: Arc<dyn BrowserFactory>,
        codes: Arc<dyn VerificationCodeSource>,
    ) -> Self {
        Self {
            app,
            browser,
            codes,
        }
    }
}

#[async_trait]
impl NavigatorFactory for SiteRegistry {
    async fn build(
        &self,
        crawler: &CrawlerConfig,
    ) -> Result<Box<dyn SiteNavigator + Send>, ScrapeError> {
        // Resolve the name before paying for a tab.
        let site = canonical_site(&crawler.name).ok_or_else(|| ScrapeError::UnknownCrawler {
            name: crawler.name.clone(),
        })?;
        let page = self.browser.open_page().await?;
        build_navigator(site, page, &self.app, Arc::clone(&self.codes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_site_is_case_insensitive() {
        assert_eq!(canonical_site("linkedin"), Some("Linkedin"));
        assert_eq!(canonical_site("INFOJOBS"), Some("Infojobs"));
        assert_eq!(canonical_site("monster"), None);
    }

    #[test]
    fn site_for_url_matches_by_host() {
        assert_eq!(
            site_for_url("https://www.infojobs.net/of-i123.aspx"),
            Some("Infojobs")
        );
        assert_eq!(
            site_for_url("https://es.linkedin.com/jobs/view/42"),
            Some("Linkedin")
        );
        assert_eq!(site_for_url("https://example.com/jobs/1"), None);
    }

    #[test]
    fn site_for_url_ignores_hosts_in_paths() {
        assert_eq!(
            site_for_url("https://example.com/redirect?to=linkedin.com"),
            None
        );
    }
}
