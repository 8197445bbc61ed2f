//! Append-only JSONL job store for the CLI.
//!
//! One scraped posting per line, keyed by the normalized posting URL. The
//! key index is loaded once at open and kept in memory; `merge_duplicates`
//! compacts the file down to the first occurrence of each key. This is the
//! thin front end's stand-in for a real storage backend — the core only
//! ever sees the `JobStore` trait.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jobscout_scraper::{job_key, JobStore, JobSummary, ScrapeError};

#[derive(Debug, Serialize, Deserialize)]
struct StoredJob {
    key: String,
    scraped_at: DateTime<Utc>,
    #[serde(flatten)]
    job: JobSummary,
}

pub struct JsonlStore {
    path: PathBuf,
    index: Mutex<HashSet<String>>,
}

impl JsonlStore {
    /// Opens the store, indexing any jobs already on disk.
    ///
    /// # Errors
    ///
    /// Fails if an existing file cannot be read. Unparseable lines are
    /// skipped with a warning rather than refusing to start.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let mut index = HashSet::new();

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                for (lineno, line) in content.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StoredJob>(line) {
                        Ok(stored) => {
                            index.insert(stored.key);
                        }
                        Err(err) => {
                            tracing::warn!(
                                path = %path.display(),
                                line = lineno + 1,
                                error = %err,
                                "skipping unparseable job line"
                            );
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path,
            index: Mutex::new(index),
        })
    }

    pub fn len(&self) -> usize {
        self.index.lock().expect("index lock poisoned").len()
    }

    fn io_err(&self, err: &std::io::Error) -> ScrapeError {
        ScrapeError::Store(format!("{}: {err}", self.path.display()))
    }
}

#[async_trait]
impl JobStore for JsonlStore {
    async fn job_exists(&self, id: &str) -> Result<bool, ScrapeError> {
        Ok(self.index.lock().expect("index lock poisoned").contains(id))
    }

    async fn insert_job(&self, job: &JobSummary) -> Result<Option<String>, ScrapeError> {
        let key = job_key(&job.url);

        let mut index = self.index.lock().expect("index lock poisoned");
        if index.contains(&key) {
            return Ok(None);
        }

        let stored = StoredJob {
            key: key.clone(),
            scraped_at: Utc::now(),
            job: job.clone(),
        };
        let line = serde_json::to_string(&stored).map_err(|e| ScrapeError::Store(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_err(&e))?;
            }
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(&e))?;
        writeln!(file, "{line}").map_err(|e| self.io_err(&e))?;

        index.insert(key.clone());
        Ok(Some(key))
    }

    async fn merge_duplicates(&self) -> Result<u64, ScrapeError> {
        // Hold the index for the whole compaction so no insert can append
        // between the read and the rename.
        let _guard = self.index.lock().expect("index lock poisoned");

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(self.io_err(&e)),
        };

        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        let mut dropped: u64 = 0;
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let key = serde_json::from_str::<StoredJob>(line)
                .map(|stored| stored.key)
                .unwrap_or_else(|_| line.to_string());
            if seen.insert(key) {
                kept.push(line);
            } else {
                dropped += 1;
            }
        }
        if dropped == 0 {
            return Ok(0);
        }

        let tmp_path = self.path.with_extension("jsonl.tmp");
        let body = kept.join("\n") + "\n";
        std::fs::write(&tmp_path, body).map_err(|e| self.io_err(&e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| self.io_err(&e))?;

        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(url: &str) -> JobSummary {
        JobSummary {
            title: "Rust Developer".to_string(),
            company: "Acme".to_string(),
            location: "Madrid".to_string(),
            url: url.to_string(),
            html: "<html></html>".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_then_exists_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path().join("jobs.jsonl")).unwrap();

        let id = store
            .insert_job(&job("https://example.com/jobs/1?utm=x"))
            .await
            .unwrap()
            .expect("first insert stores");
        assert!(store.job_exists(&id).await.unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_urls_are_rejected_at_insert() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path().join("jobs.jsonl")).unwrap();

        store.insert_job(&job("https://example.com/jobs/1")).await.unwrap();
        let second = store
            .insert_job(&job("https://example.com/jobs/1?utm=trackers"))
            .await
            .unwrap();
        assert!(second.is_none(), "same posting key must dedup");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.jsonl");

        let store = JsonlStore::open(&path).unwrap();
        store.insert_job(&job("https://example.com/jobs/1")).await.unwrap();
        store.insert_job(&job("https://example.com/jobs/2")).await.unwrap();
        drop(store);

        let reopened = JsonlStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        let dup = reopened
            .insert_job(&job("https://example.com/jobs/2"))
            .await
            .unwrap();
        assert!(dup.is_none());
    }

    #[tokio::test]
    async fn merge_duplicates_compacts_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.jsonl");

        // Two lines sharing a key, written behind the index's back.
        let store = JsonlStore::open(&path).unwrap();
        store.insert_job(&job("https://example.com/jobs/1")).await.unwrap();
        drop(store);
        let line = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, format!("{line}{line}")).unwrap();

        let store = JsonlStore::open(&path).unwrap();
        let dropped = store.merge_duplicates().await.unwrap();
        assert_eq!(dropped, 1);

        let compacted = std::fs::read_to_string(&path).unwrap();
        assert_eq!(compacted.lines().count(), 1);
    }

    #[tokio::test]
    async fn merge_with_no_duplicates_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path().join("jobs.jsonl")).unwrap();
        store.insert_job(&job("https://example.com/jobs/1")).await.unwrap();
        assert_eq!(store.merge_duplicates().await.unwrap(), 0);
    }
}
