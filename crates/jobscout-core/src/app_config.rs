use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Per-site login credentials, read from the environment.
#[derive(Clone, Default)]
pub struct SiteCredentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl SiteCredentials {
    /// Both halves must be present for a login-driven site.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.email.is_some() && self.password.is_some()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub crawlers_path: PathBuf,
    pub state_path: PathBuf,
    pub jobs_out_path: PathBuf,
    pub webdriver_url: String,
    pub run_in_tabs: bool,
    pub nav_max_retries: u32,
    pub nav_retry_delay_secs: u64,
    pub page_load_timeout_secs: u64,
    pub element_wait_timeout_secs: u64,
    pub verification_timeout_secs: u64,
    pub verification_code_path: PathBuf,
    /// Freshness window for skipping recently completed keywords, in seconds.
    /// `0` disables skipping.
    pub skip_fresh_secs: u64,
    pub linkedin: SiteCredentials,
    pub infojobs: SiteCredentials,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |c: &SiteCredentials| {
            if c.is_complete() {
                "[configured]"
            } else {
                "[not configured]"
            }
        };
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("crawlers_path", &self.crawlers_path)
            .field("state_path", &self.state_path)
            .field("jobs_out_path", &self.jobs_out_path)
            .field("webdriver_url", &self.webdriver_url)
            .field("run_in_tabs", &self.run_in_tabs)
            .field("nav_max_retries", &self.nav_max_retries)
            .field("nav_retry_delay_secs", &self.nav_retry_delay_secs)
            .field("page_load_timeout_secs", &self.page_load_timeout_secs)
            .field(
                "element_wait_timeout_secs",
                &self.element_wait_timeout_secs,
            )
            .field(
                "verification_timeout_secs",
                &self.verification_timeout_secs,
            )
            .field("verification_code_path", &self.verification_code_path)
            .field("skip_fresh_secs", &self.skip_fresh_secs)
            .field("linkedin", &redact(&self.linkedin))
            .field("infojobs", &redact(&self.infojobs))
            .finish()
    }
}
