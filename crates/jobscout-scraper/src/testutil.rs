//! Scripted collaborators for exercising the executor and scheduler
//! without a browser: a deterministic navigator, an in-memory job store,
//! and a canned verification-code source.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use jobscout_core::CrawlerConfig;

use crate::browser::BrowserPage;
use crate::error::ScrapeError;
use crate::navigator::{JobSummary, NavState, SiteNavigator};
use crate::parse::max_page;
use crate::sites::NavigatorFactory;
use crate::store::JobStore;

fn transient() -> ScrapeError {
    ScrapeError::WaitTimeout {
        what: "scripted".to_owned(),
    }
}

/// Deterministic navigator: `total_results` postings, `page_size` per page,
/// with optional injected failures.
pub struct ScriptedNavigator {
    site: &'static str,
    state: NavState,
    total_results: u32,
    page_size: u32,
    current_page: u32,
    next_page_clicks: u32,
    logins: Arc<AtomicU64>,
    recoveries: Arc<AtomicU64>,
    /// Fail `click_next_page` once after this many successful clicks.
    fail_next_page_after: Option<u32>,
    /// Report list exhaustion once this page is reached.
    exhaust_after_page: Option<u32>,
    /// Fail this many `job_summary` calls (transiently) before succeeding.
    job_summary_failures: u32,
    /// Fail every `search` call transiently.
    fail_search: bool,
}

impl ScriptedNavigator {
    pub fn new(total_results: u32, page_size: u32) -> Self {
        Self {
            site: "Scripted",
            state: NavState::Unauthenticated,
            total_results,
            page_size,
            current_page: 1,
            next_page_clicks: 0,
            logins: Arc::new(AtomicU64::new(0)),
            recoveries: Arc::new(AtomicU64::new(0)),
            fail_next_page_after: None,
            exhaust_after_page: None,
            job_summary_failures: 0,
            fail_search: false,
        }
    }

    pub fn next_page_clicks(&self) -> u32 {
        self.next_page_clicks
    }

    pub fn login_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.logins)
    }

    pub fn recovery_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.recoveries)
    }

    pub fn fail_next_page_after(&mut self, successful_clicks: u32) {
        self.fail_next_page_after = Some(successful_clicks);
    }

    pub fn exhaust_after_page(&mut self, page: u32) {
        self.exhaust_after_page = Some(page);
    }

    pub fn fail_job_summaries(&mut self, count: u32) {
        self.job_summary_failures = count;
    }

    pub fn fail_search(&mut self) {
        self.fail_search = true;
    }

    fn jobs_on_current_page(&self) -> u32 {
        let before = (self.current_page - 1) * self.page_size;
        self.total_results
            .saturating_sub(before)
            .min(self.page_size)
    }
}

#[async_trait]
impl SiteNavigator for ScriptedNavigator {
    fn site(&self) -> &'static str {
        self.site
    }

    fn state(&self) -> NavState {
        self.state
    }

    fn page_size(&self) -> u32 {
        self.page_size
    }

    async fn login(&mut self) -> Result<(), ScrapeError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        self.state = NavState::Authenticated;
        Ok(())
    }

    async fn search(&mut self, _keyword: &str, _location: Option<&str>) -> Result<(), ScrapeError> {
        if self.fail_search {
            return Err(transient());
        }
        self.current_page = 1;
        self.state = NavState::Searching;
        Ok(())
    }

    async fn total_results(&mut self) -> Result<u32, ScrapeError> {
        Ok(self.total_results)
    }

    async fn list_len(&mut self) -> Result<usize, ScrapeError> {
        self.state = NavState::ListPage(self.current_page);
        Ok(self.jobs_on_current_page() as usize)
    }

    async fn scroll_jobs_list(&mut self, _index: usize) -> Result<(), ScrapeError> {
        Ok(())
    }

    async fn job_summary(&mut self, index: usize) -> Result<JobSummary, ScrapeError> {
        if self.job_summary_failures > 0 {
            self.job_summary_failures -= 1;
            return Err(transient());
        }
        let page = self.current_page;
        Ok(JobSummary {
            title: format!("Job p{page} i{index}"),
            company: "Scripted Co".to_owned(),
            location: "Remote".to_owned(),
            url: format!("https://jobs.example.com/{page}/{index}"),
            html: "<html></html>".to_owned(),
        })
    }

    async fn click_next_page(&mut self) -> Result<bool, ScrapeError> {
        if let Some(after) = self.fail_next_page_after {
            if self.next_page_clicks >= after {
                self.fail_next_page_after = None;
                return Err(transient());
            }
        }
        if let Some(limit) = self.exhaust_after_page {
            if self.current_page >= limit {
                self.state = NavState::Done;
                return Ok(false);
            }
        }
        if self.current_page >= max_page(self.total_results, self.page_size) {
            self.state = NavState::Done;
            return Ok(false);
        }
        self.next_page_clicks += 1;
        self.current_page += 1;
        self.state = NavState::ListPage(self.current_page);
        Ok(true)
    }

    async fn recover(&mut self) -> Result<(), ScrapeError> {
        self.recoveries.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ScrapeError> {
        Ok(())
    }
}

/// Factory handing out [`ScriptedNavigator`]s and recording build order.
pub struct ScriptedFactory {
    total_results: u32,
    page_size: u32,
    built: Mutex<Vec<String>>,
}

impl ScriptedFactory {
    pub fn new(total_results: u32, page_size: u32) -> Self {
        Self {
            total_results,
            page_size,
            built: Mutex::new(Vec::new()),
        }
    }

    pub fn built(&self) -> Vec<String> {
        self.built.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl NavigatorFactory for ScriptedFactory {
    async fn build(
        &self,
        crawler: &CrawlerConfig,
    ) -> Result<Box<dyn SiteNavigator + Send>, ScrapeError> {
        self.built
            .lock()
            .expect("lock poisoned")
            .push(crawler.name.clone());
        Ok(Box::new(ScriptedNavigator::new(
            self.total_results,
            self.page_size,
        )))
    }
}

/// In-memory [`JobStore`] keyed by job id.
#[derive(Default)]
pub struct MemStore {
    jobs: Mutex<BTreeMap<String, JobSummary>>,
    merges: AtomicU64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().expect("lock poisoned").len()
    }

    pub fn merge_calls(&self) -> u64 {
        self.merges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for MemStore {
    async fn job_exists(&self, id: &str) -> Result<bool, ScrapeError> {
        Ok(self.jobs.lock().expect("lock poisoned").contains_key(id))
    }

    async fn insert_job(&self, job: &JobSummary) -> Result<Option<String>, ScrapeError> {
        let id = crate::store::job_key(&job.url);
        let mut jobs = self.jobs.lock().expect("lock poisoned");
        if jobs.contains_key(&id) {
            return Ok(None);
        }
        jobs.insert(id.clone(), job.clone());
        Ok(Some(id))
    }

    async fn merge_duplicates(&self) -> Result<u64, ScrapeError> {
        self.merges.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }
}

/// Scripted [`BrowserPage`] for exercising site navigators: selectors
/// registered via [`set_present`](FakePage::set_present) exist, texts come
/// from [`set_text`](FakePage::set_text), and every interaction is recorded
/// for assertions.
#[derive(Default)]
pub struct FakePage {
    present: Mutex<HashSet<String>>,
    texts: Mutex<HashMap<String, String>>,
    url: Mutex<String>,
    html: Mutex<String>,
    loads: Mutex<Vec<String>>,
    clicks: Mutex<Vec<String>>,
    typed: Mutex<Vec<(String, String)>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_present(&self, selector: &str) {
        self.present
            .lock()
            .expect("lock poisoned")
            .insert(selector.to_owned());
    }

    /// Registers the selector's text; the selector becomes present too.
    pub fn set_text(&self, selector: &str, text: &str) {
        self.set_present(selector);
        self.texts
            .lock()
            .expect("lock poisoned")
            .insert(selector.to_owned(), text.to_owned());
    }

    pub fn set_url(&self, url: &str) {
        *self.url.lock().expect("lock poisoned") = url.to_owned();
    }

    pub fn loads(&self) -> Vec<String> {
        self.loads.lock().expect("lock poisoned").clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.lock().expect("lock poisoned").clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.typed.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn load_page(&self, url: &str) -> Result<(), ScrapeError> {
        self.loads.lock().expect("lock poisoned").push(url.to_owned());
        Ok(())
    }

    async fn get_text(&self, selector: &str) -> Result<String, ScrapeError> {
        self.texts
            .lock()
            .expect("lock poisoned")
            .get(selector)
            .cloned()
            .ok_or_else(|| ScrapeError::NoSuchElement {
                selector: selector.to_owned(),
            })
    }

    async fn get_elements(&self, selector: &str) -> Result<Vec<String>, ScrapeError> {
        let present = self.present.lock().expect("lock poisoned");
        Ok(if present.contains(selector) {
            vec!["el-0".to_owned()]
        } else {
            Vec::new()
        })
    }

    async fn click(&self, selector: &str) -> Result<(), ScrapeError> {
        self.clicks
            .lock()
            .expect("lock poisoned")
            .push(selector.to_owned());
        Ok(())
    }

    async fn send_keys(&self, selector: &str, text: &str) -> Result<(), ScrapeError> {
        self.typed
            .lock()
            .expect("lock poisoned")
            .push((selector.to_owned(), text.to_owned()));
        Ok(())
    }

    async fn wait_until_present(&self, selector: &str) -> Result<(), ScrapeError> {
        if self.present.lock().expect("lock poisoned").contains(selector) {
            Ok(())
        } else {
            Err(ScrapeError::WaitTimeout {
                what: selector.to_owned(),
            })
        }
    }

    async fn wait_until_page_loaded(&self) -> Result<(), ScrapeError> {
        Ok(())
    }

    async fn current_url(&self) -> Result<String, ScrapeError> {
        Ok(self.url.lock().expect("lock poisoned").clone())
    }

    async fn page_html(&self) -> Result<String, ScrapeError> {
        Ok(self.html.lock().expect("lock poisoned").clone())
    }

    async fn execute_script(&self, _script: &str) -> Result<(), ScrapeError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        Ok(())
    }
}

/// Always returns the same verification code.
pub struct StaticCodeSource(pub &'static str);

#[async_trait]
impl crate::browser::VerificationCodeSource for StaticCodeSource {
    async fn fetch_verification_code(&self) -> Result<String, ScrapeError> {
        Ok(self.0.to_owned())
    }
}
