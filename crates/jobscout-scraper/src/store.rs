//! Storage collaborator interface.
//!
//! Job persistence (relational schema, dedup/merge queries) lives outside
//! this crate; executors only see this trait. Job identity is derived from
//! the posting URL so the same posting seen on consecutive pages or runs
//! pre-filters cheaply before the store's own dedup.

use async_trait::async_trait;

use crate::error::ScrapeError;
use crate::navigator::JobSummary;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn job_exists(&self, id: &str) -> Result<bool, ScrapeError>;

    /// Persists one job. Returns the stored id, or `None` when the store
    /// recognized it as a duplicate.
    async fn insert_job(&self, job: &JobSummary) -> Result<Option<String>, ScrapeError>;

    /// Collapses duplicate records accumulated across sites; returns how
    /// many were merged.
    async fn merge_duplicates(&self) -> Result<u64, ScrapeError>;
}

/// Stable job id for a posting URL.
///
/// Tracking parameters and fragments vary per visit; scheme+host+path do
/// not. The host is lowercased, the query and fragment are dropped, and a
/// trailing slash is trimmed.
#[must_use]
pub fn job_key(url: &str) -> String {
    let no_fragment = url.split('#').next().unwrap_or(url);
    let no_query = no_fragment.split('?').next().unwrap_or(no_fragment);
    let trimmed = no_query.trim_end_matches('/');

    match trimmed.split_once("://") {
        Some((scheme, rest)) => {
            let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
            let host = host.to_ascii_lowercase();
            if path.is_empty() {
                format!("{scheme}://{host}")
            } else {
                format!("{scheme}://{host}/{path}")
            }
        }
        None => trimmed.to_string(),
    }
}
