//! Verification-code source backed by a drop file.
//!
//! The mail side stays external: whatever reads the inbox (a human or a
//! mail hook) writes the security code into the configured file, and this
//! source polls for it, consuming the file once a code appears. The
//! timeout is this source's own — the navigator just awaits.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use jobscout_scraper::{ScrapeError, VerificationCodeSource};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct FileCodeSource {
    path: PathBuf,
    timeout: Duration,
}

impl FileCodeSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }
}

#[async_trait]
impl VerificationCodeSource for FileCodeSource {
    async fn fetch_verification_code(&self) -> Result<String, ScrapeError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match std::fs::read_to_string(&self.path) {
                Ok(content) => {
                    let code = content.trim();
                    if !code.is_empty() {
                        // Consume the code so a later login cannot reuse it.
                        if let Err(err) = std::fs::remove_file(&self.path) {
                            tracing::warn!(
                                path = %self.path.display(),
                                error = %err,
                                "could not remove consumed verification code file"
                            );
                        }
                        return Ok(code.to_string());
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::debug!(
                        path = %self.path.display(),
                        error = %e,
                        "verification code file unreadable — still waiting"
                    );
                }
            }

            if Instant::now() >= deadline {
                return Err(ScrapeError::VerificationTimeout {
                    secs: self.timeout.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL.min(self.timeout.max(Duration::from_millis(10))))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_and_consumes_a_waiting_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("code.txt");
        std::fs::write(&path, "483921\n").unwrap();

        let source = FileCodeSource::new(&path, Duration::from_secs(5));
        let code = source.fetch_verification_code().await.unwrap();

        assert_eq!(code, "483921");
        assert!(!path.exists(), "a consumed code must not be reusable");
    }

    #[tokio::test]
    async fn missing_file_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileCodeSource::new(dir.path().join("code.txt"), Duration::from_millis(0));

        let err = source.fetch_verification_code().await.unwrap_err();
        assert!(matches!(err, ScrapeError::VerificationTimeout { .. }));
    }

    #[tokio::test]
    async fn blank_file_counts_as_no_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("code.txt");
        std::fs::write(&path, "   \n").unwrap();

        let source = FileCodeSource::new(&path, Duration::from_millis(0));
        let err = source.fetch_verification_code().await.unwrap_err();
        assert!(matches!(err, ScrapeError::VerificationTimeout { .. }));
    }
}
