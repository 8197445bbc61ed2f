//! Durable crawl-progress state, keyed by (crawler name, keyword).
//!
//! The whole state is one JSON blob on disk: per crawler, a map of keyword
//! to its last processed page, seen count, and failure record. The blob is
//! loaded once when the store is opened and rewritten on every mutation, so
//! a crash at any point loses at most the progress since the last page
//! boundary. Writes go to a sibling temp file which is then renamed over
//! the target, so a crash mid-write can never truncate existing state.
//!
//! Keyword entries are never deleted automatically; [`StateStore::clear_state`]
//! is the operator-facing reset.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write state file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Progress record for one (crawler, keyword) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordState {
    /// Last fully processed list page; `0` means no page completed yet.
    pub last_page: u32,
    /// Total job cards seen across all runs of this keyword.
    pub seen_count: u64,
    pub failed: bool,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
    /// Set when a run finished the keyword without failing; cleared the
    /// moment a new run starts writing page progress.
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlerState {
    pub keywords: BTreeMap<String, KeywordState>,
    /// Keywords whose most recent run exhausted its retries, in the order
    /// the failures were first recorded.
    pub failed_keywords: Vec<String>,
}

/// One row of the end-of-run failure report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordFailure {
    pub keyword: String,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
}

/// Process-wide crawl state store backed by a single JSON file.
///
/// Every mutating call flushes synchronously before returning; readers
/// always observe the last flushed value. The store is safe to share
/// across tasks behind an `Arc`.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: Mutex<BTreeMap<String, CrawlerState>>,
}

impl StateStore {
    /// Opens the store, loading existing state from `path`.
    ///
    /// A missing file yields an empty store; the file is first created by
    /// the first mutation.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Read`] if the file exists but cannot be read,
    /// or [`StateError::Corrupt`] if it does not parse.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| StateError::Corrupt {
                    path: path.display().to_string(),
                    source: e,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(StateError::Read {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Whether a keyword completed recently enough to skip this cycle.
    ///
    /// True iff the keyword's last run finished without failing and its
    /// completion time is within `freshness` of now. A zero `freshness`
    /// disables skipping.
    #[must_use]
    pub fn should_skip_keyword(&self, crawler: &str, keyword: &str, freshness: Duration) -> bool {
        if freshness.is_zero() {
            return false;
        }
        let state = self.state.lock().expect("state lock poisoned");
        let Some(ks) = state.get(crawler).and_then(|c| c.keywords.get(keyword)) else {
            return false;
        };
        if ks.failed {
            return false;
        }
        match ks.completed_at {
            Some(completed) => {
                let age = Utc::now().signed_duration_since(completed);
                age >= chrono::TimeDelta::zero()
                    && age.to_std().is_ok_and(|age| age <= freshness)
            }
            None => false,
        }
    }

    /// Last fully processed page for the keyword, `0` when unknown.
    #[must_use]
    pub fn resume_page(&self, crawler: &str, keyword: &str) -> u32 {
        let state = self.state.lock().expect("state lock poisoned");
        state
            .get(crawler)
            .and_then(|c| c.keywords.get(keyword))
            .map_or(0, |ks| ks.last_page)
    }

    /// Snapshot of one keyword's state, for reporting.
    #[must_use]
    pub fn keyword_state(&self, crawler: &str, keyword: &str) -> Option<KeywordState> {
        let state = self.state.lock().expect("state lock poisoned");
        state
            .get(crawler)
            .and_then(|c| c.keywords.get(keyword))
            .cloned()
    }

    /// Records that `page` finished processing.
    ///
    /// Idempotent; safe (and expected) to call after every page transition.
    /// Writing page progress marks the keyword in-flight again, so a crash
    /// here resumes instead of being skipped as complete.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the flush fails.
    pub fn update_state(&self, crawler: &str, keyword: &str, page: u32) -> Result<(), StateError> {
        let mut state = self.state.lock().expect("state lock poisoned");
        let ks = entry(&mut state, crawler, keyword);
        ks.last_page = page;
        ks.completed_at = None;
        self.flush(&state)
    }

    /// Adds `added` to the keyword's seen counter.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the flush fails.
    pub fn record_seen(&self, crawler: &str, keyword: &str, added: u64) -> Result<(), StateError> {
        let mut state = self.state.lock().expect("state lock poisoned");
        let ks = entry(&mut state, crawler, keyword);
        ks.seen_count = ks.seen_count.saturating_add(added);
        self.flush(&state)
    }

    /// Marks the keyword as fully crawled without failure.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the flush fails.
    pub fn mark_completed(&self, crawler: &str, keyword: &str) -> Result<(), StateError> {
        let mut state = self.state.lock().expect("state lock poisoned");
        let cs = state.entry(crawler.to_string()).or_default();
        cs.failed_keywords.retain(|k| k != keyword);
        let ks = cs.keywords.entry(keyword.to_string()).or_default();
        ks.failed = false;
        ks.completed_at = Some(Utc::now());
        self.flush(&state)
    }

    /// Records a keyword-level failure.
    ///
    /// Appends to the crawler's failed-keyword list and stores the error
    /// for end-of-run reporting. `last_page` is left untouched so the next
    /// run resumes instead of restarting.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the flush fails.
    pub fn record_failure(
        &self,
        crawler: &str,
        keyword: &str,
        error: &str,
    ) -> Result<(), StateError> {
        let mut state = self.state.lock().expect("state lock poisoned");
        let cs = state.entry(crawler.to_string()).or_default();
        if !cs.failed_keywords.iter().any(|k| k == keyword) {
            cs.failed_keywords.push(keyword.to_string());
        }
        let ks = cs.keywords.entry(keyword.to_string()).or_default();
        ks.failed = true;
        ks.last_error = Some(error.to_string());
        ks.last_error_time = Some(Utc::now());
        ks.completed_at = None;
        self.flush(&state)
    }

    /// Resets all keyword state for a crawler. Operator-facing.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the flush fails.
    pub fn clear_state(&self, crawler: &str) -> Result<(), StateError> {
        let mut state = self.state.lock().expect("state lock poisoned");
        state.remove(crawler);
        self.flush(&state)
    }

    /// The crawler's recorded failures, in first-failure order.
    #[must_use]
    pub fn failure_summary(&self, crawler: &str) -> Vec<KeywordFailure> {
        let state = self.state.lock().expect("state lock poisoned");
        let Some(cs) = state.get(crawler) else {
            return Vec::new();
        };
        cs.failed_keywords
            .iter()
            .map(|keyword| {
                let ks = cs.keywords.get(keyword);
                KeywordFailure {
                    keyword: keyword.clone(),
                    last_error: ks.and_then(|k| k.last_error.clone()),
                    last_error_time: ks.and_then(|k| k.last_error_time),
                }
            })
            .collect()
    }

    /// Crawler names present in the store.
    #[must_use]
    pub fn crawler_names(&self) -> Vec<String> {
        let state = self.state.lock().expect("state lock poisoned");
        state.keys().cloned().collect()
    }

    /// Serializes the blob to a sibling temp file, then renames it over the
    /// target. Rename is atomic on the same filesystem, so readers never
    /// observe a partially written file.
    fn flush(&self, state: &BTreeMap<String, CrawlerState>) -> Result<(), StateError> {
        let write_err = |source: std::io::Error| StateError::Write {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let body = serde_json::to_vec_pretty(state).map_err(StateError::Serialize)?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp = std::fs::File::create(&tmp_path).map_err(write_err)?;
        tmp.write_all(&body).map_err(write_err)?;
        tmp.sync_all().map_err(write_err)?;
        drop(tmp);

        std::fs::rename(&tmp_path, &self.path).map_err(write_err)
    }
}

fn entry<'a>(
    state: &'a mut BTreeMap<String, CrawlerState>,
    crawler: &str,
    keyword: &str,
) -> &'a mut KeywordState {
    state
        .entry(crawler.to_string())
        .or_default()
        .keywords
        .entry(keyword.to_string())
        .or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_at(dir: &tempfile::TempDir) -> StateStore {
        StateStore::open(dir.path().join("state.json")).unwrap()
    }

    #[test]
    fn missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        assert_eq!(store.resume_page("Linkedin", "rust"), 0);
        assert!(store.failure_summary("Linkedin").is_empty());
    }

    #[test]
    fn page_progress_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = StateStore::open(&path).unwrap();
        store.update_state("Infojobs", "rust", 5).unwrap();
        store.record_seen("Infojobs", "rust", 42).unwrap();
        drop(store); // simulated crash: nothing beyond the flushed file survives

        let reopened = StateStore::open(&path).unwrap();
        assert_eq!(reopened.resume_page("Infojobs", "rust"), 5);
        let ks = reopened.keyword_state("Infojobs", "rust").unwrap();
        assert_eq!(ks.seen_count, 42);
        assert!(!ks.failed);
        // Mid-run progress is not a completed keyword.
        assert!(!reopened.should_skip_keyword("Infojobs", "rust", Duration::from_secs(3600)));
    }

    #[test]
    fn update_state_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        store.update_state("Infojobs", "rust", 3).unwrap();
        let before = store.keyword_state("Infojobs", "rust").unwrap();
        store.update_state("Infojobs", "rust", 3).unwrap();
        assert_eq!(store.keyword_state("Infojobs", "rust").unwrap(), before);
    }

    #[test]
    fn completed_keyword_is_skipped_within_freshness_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        store.update_state("Infojobs", "rust", 8).unwrap();
        store.mark_completed("Infojobs", "rust").unwrap();

        assert!(store.should_skip_keyword("Infojobs", "rust", Duration::from_secs(3600)));
        // Zero freshness disables skipping entirely.
        assert!(!store.should_skip_keyword("Infojobs", "rust", Duration::ZERO));
    }

    #[test]
    fn new_page_progress_clears_completion() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        store.mark_completed("Infojobs", "rust").unwrap();
        store.update_state("Infojobs", "rust", 1).unwrap();
        assert!(!store.should_skip_keyword("Infojobs", "rust", Duration::from_secs(3600)));
    }

    #[test]
    fn failure_keeps_resume_page_and_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        store.update_state("Linkedin", "rust", 4).unwrap();
        store
            .record_failure("Linkedin", "rust", "timeout waiting for .jobs-list")
            .unwrap();

        assert_eq!(store.resume_page("Linkedin", "rust"), 4);
        assert!(!store.should_skip_keyword("Linkedin", "rust", Duration::from_secs(3600)));

        let summary = store.failure_summary("Linkedin");
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].keyword, "rust");
        assert_eq!(
            summary[0].last_error.as_deref(),
            Some("timeout waiting for .jobs-list")
        );
        assert!(summary[0].last_error_time.is_some());
    }

    #[test]
    fn repeated_failures_are_listed_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        store.record_failure("Linkedin", "rust", "first").unwrap();
        store.record_failure("Linkedin", "rust", "second").unwrap();

        let summary = store.failure_summary("Linkedin");
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].last_error.as_deref(), Some("second"));
    }

    #[test]
    fn completion_clears_failed_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        store.record_failure("Linkedin", "rust", "boom").unwrap();
        store.mark_completed("Linkedin", "rust").unwrap();
        assert!(store.failure_summary("Linkedin").is_empty());
        assert!(!store.keyword_state("Linkedin", "rust").unwrap().failed);
    }

    #[test]
    fn clear_state_resets_one_crawler_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        store.update_state("Linkedin", "rust", 2).unwrap();
        store.update_state("Infojobs", "rust", 7).unwrap();

        store.clear_state("Linkedin").unwrap();
        assert_eq!(store.resume_page("Linkedin", "rust"), 0);
        assert_eq!(store.resume_page("Infojobs", "rust"), 7);
    }

    #[test]
    fn flush_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_at(&dir);
        store.update_state("Linkedin", "rust", 1).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
    }

    #[test]
    fn corrupt_file_is_a_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = StateStore::open(&path).unwrap_err();
        assert!(matches!(err, StateError::Corrupt { .. }));
    }
}
