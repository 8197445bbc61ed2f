//! Capability interfaces for the external collaborators a crawl consumes.
//!
//! The browser-automation layer, the verification-code source (mail
//! reading), and tab creation are all external to this crate; navigators
//! and executors only ever see these traits. One [`BrowserPage`] is one
//! exclusive site tab — concurrent tabs get independent instances sharing
//! no mutable state.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ScrapeError;

/// One exclusive browser tab, driven via CSS selectors.
///
/// All methods are fallible: any primitive may time out, lose its
/// transport, or find nothing. Callers wrap the flaky ones in the retry
/// policy rather than expecting reliability here.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn load_page(&self, url: &str) -> Result<(), ScrapeError>;

    /// Visible text of the first element matching `selector`.
    async fn get_text(&self, selector: &str) -> Result<String, ScrapeError>;

    /// Opaque handles of every element matching `selector`. Most callers
    /// only need the count; per-element access goes through indexed
    /// selectors.
    async fn get_elements(&self, selector: &str) -> Result<Vec<String>, ScrapeError>;

    async fn click(&self, selector: &str) -> Result<(), ScrapeError>;

    async fn send_keys(&self, selector: &str, text: &str) -> Result<(), ScrapeError>;

    /// Polls until `selector` matches something or the page's element wait
    /// elapses.
    async fn wait_until_present(&self, selector: &str) -> Result<(), ScrapeError>;

    /// Polls until the document reports itself fully loaded.
    async fn wait_until_page_loaded(&self) -> Result<(), ScrapeError>;

    async fn current_url(&self) -> Result<String, ScrapeError>;

    async fn page_html(&self) -> Result<String, ScrapeError>;

    /// Runs a script in page context. Needed for scrolling lazy-rendered
    /// lists; not used for extraction.
    async fn execute_script(&self, script: &str) -> Result<(), ScrapeError>;

    /// Releases the tab. Further calls on this page are invalid.
    async fn close(&self) -> Result<(), ScrapeError>;
}

/// Opens independent site tabs.
#[async_trait]
pub trait BrowserFactory: Send + Sync {
    async fn open_page(&self) -> Result<Arc<dyn BrowserPage>, ScrapeError>;
}

/// External mail-reading collaborator: produces the secondary verification
/// code some sites demand at login. Blocks with its own timeout.
#[async_trait]
pub trait VerificationCodeSource: Send + Sync {
    async fn fetch_verification_code(&self) -> Result<String, ScrapeError>;
}
