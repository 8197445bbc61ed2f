use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("automation transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webdriver error \"{error}\" (status {status}): {message}")]
    Driver {
        status: u16,
        error: String,
        message: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no element matched selector {selector}")]
    NoSuchElement { selector: String },

    #[error("timed out waiting for {what}")]
    WaitTimeout { what: String },

    #[error("could not parse a result count from \"{text}\"")]
    ResultCount { text: String },

    #[error("{site} login failed: {reason}")]
    AuthFailed { site: String, reason: String },

    #[error("verification code did not arrive within {secs}s")]
    VerificationTimeout { secs: u64 },

    #[error("no credentials configured for {site}")]
    MissingCredentials { site: String },

    #[error("no site supports reprocessing this URL: {url}")]
    UnsupportedUrl { url: String },

    #[error("no crawler or site named '{name}' is configured")]
    UnknownCrawler { name: String },

    #[error("shutdown requested")]
    Cancelled,

    #[error(transparent)]
    State(#[from] jobscout_state::StateError),

    #[error(transparent)]
    Config(#[from] jobscout_core::ConfigError),

    #[error("job store error: {0}")]
    Store(String),
}

impl ScrapeError {
    /// Returns `true` for failures worth retrying after a delay.
    ///
    /// **Transient:**
    /// - [`ScrapeError::Http`] — network-level failure talking to the driver.
    /// - [`ScrapeError::Driver`] with a 5xx status — driver-side hiccup.
    /// - [`ScrapeError::NoSuchElement`] / [`ScrapeError::WaitTimeout`] —
    ///   content that should be present but is not yet; sites lazy-render
    ///   and interstitials block, so these usually clear after a recovery
    ///   action and a short wait.
    ///
    /// **Not transient (propagated immediately):**
    /// - Auth, verification, and credential errors — retrying cannot help
    ///   and repeated login attempts get accounts locked.
    /// - [`ScrapeError::Deserialize`] / [`ScrapeError::ResultCount`] —
    ///   malformed data stays malformed.
    /// - [`ScrapeError::Cancelled`] — shutdown must win over retries.
    /// - Config, state, and store errors.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            ScrapeError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            ScrapeError::Driver { status, .. } => *status >= 500,
            ScrapeError::NoSuchElement { .. } | ScrapeError::WaitTimeout { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_element_and_timeouts_are_transient() {
        assert!(ScrapeError::NoSuchElement {
            selector: ".jobs".to_owned()
        }
        .is_transient());
        assert!(ScrapeError::WaitTimeout {
            what: "page load".to_owned()
        }
        .is_transient());
    }

    #[test]
    fn driver_errors_are_transient_only_for_5xx() {
        assert!(ScrapeError::Driver {
            status: 500,
            error: "unknown error".to_owned(),
            message: "tab crashed".to_owned()
        }
        .is_transient());
        assert!(!ScrapeError::Driver {
            status: 400,
            error: "invalid argument".to_owned(),
            message: "bad selector".to_owned()
        }
        .is_transient());
    }

    #[test]
    fn auth_and_cancel_are_not_transient() {
        assert!(!ScrapeError::AuthFailed {
            site: "Linkedin".to_owned(),
            reason: "bad password".to_owned()
        }
        .is_transient());
        assert!(!ScrapeError::VerificationTimeout { secs: 120 }.is_transient());
        assert!(!ScrapeError::Cancelled.is_transient());
    }
}
