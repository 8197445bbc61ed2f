use crate::app_config::{AppConfig, Environment, SiteCredentials};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup — no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected true/false, got \"{other}\""),
            }),
        }
    };

    let env = parse_environment(&or_default("JOBSCOUT_ENV", "development"));
    let log_level = or_default("JOBSCOUT_LOG_LEVEL", "info");

    let crawlers_path = PathBuf::from(or_default(
        "JOBSCOUT_CRAWLERS_PATH",
        "./config/crawlers.yaml",
    ));
    let state_path = PathBuf::from(or_default(
        "JOBSCOUT_STATE_PATH",
        "./data/scrape-state.json",
    ));
    let jobs_out_path = PathBuf::from(or_default("JOBSCOUT_JOBS_OUT_PATH", "./data/jobs.jsonl"));
    let verification_code_path = PathBuf::from(or_default(
        "JOBSCOUT_VERIFICATION_CODE_PATH",
        "./data/verification-code.txt",
    ));

    let webdriver_url = or_default("JOBSCOUT_WEBDRIVER_URL", "http://127.0.0.1:9515");
    let run_in_tabs = parse_bool("JOBSCOUT_RUN_IN_TABS", "false")?;

    let nav_max_retries = parse_u32("JOBSCOUT_NAV_MAX_RETRIES", "3")?;
    let nav_retry_delay_secs = parse_u64("JOBSCOUT_NAV_RETRY_DELAY_SECS", "5")?;
    let page_load_timeout_secs = parse_u64("JOBSCOUT_PAGE_LOAD_TIMEOUT_SECS", "30")?;
    let element_wait_timeout_secs = parse_u64("JOBSCOUT_ELEMENT_WAIT_TIMEOUT_SECS", "10")?;
    let verification_timeout_secs = parse_u64("JOBSCOUT_VERIFICATION_TIMEOUT_SECS", "120")?;
    let skip_fresh_secs = parse_u64("JOBSCOUT_SKIP_FRESH_SECS", "21600")?;

    let linkedin = SiteCredentials {
        email: lookup("LINKEDIN_EMAIL").ok(),
        password: lookup("LINKEDIN_PASSWORD").ok(),
    };
    let infojobs = SiteCredentials {
        email: lookup("INFOJOBS_EMAIL").ok(),
        password: lookup("INFOJOBS_PASSWORD").ok(),
    };

    Ok(AppConfig {
        env,
        log_level,
        crawlers_path,
        state_path,
        jobs_out_path,
        webdriver_url,
        run_in_tabs,
        nav_max_retries,
        nav_retry_delay_secs,
        page_load_timeout_secs,
        element_wait_timeout_secs,
        verification_timeout_secs,
        verification_code_path,
        skip_fresh_secs,
        linkedin,
        infojobs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn parse_environment_production() {
        assert_eq!(parse_environment("production"), Environment::Production);
    }

    #[test]
    fn parse_environment_unknown_defaults_to_development() {
        assert_eq!(parse_environment("unknown"), Environment::Development);
    }

    #[test]
    fn build_app_config_succeeds_with_empty_env() {
        let map: HashMap<&str, &str> = HashMap::new();
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.env, Environment::Development);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.webdriver_url, "http://127.0.0.1:9515");
        assert!(!cfg.run_in_tabs);
        assert_eq!(cfg.nav_max_retries, 3);
        assert_eq!(cfg.nav_retry_delay_secs, 5);
        assert_eq!(cfg.page_load_timeout_secs, 30);
        assert_eq!(cfg.element_wait_timeout_secs, 10);
        assert_eq!(cfg.verification_timeout_secs, 120);
        assert_eq!(cfg.skip_fresh_secs, 21_600);
        assert!(!cfg.linkedin.is_complete());
        assert!(!cfg.infojobs.is_complete());
    }

    #[test]
    fn build_app_config_reads_overrides() {
        let mut map = HashMap::new();
        map.insert("JOBSCOUT_ENV", "production");
        map.insert("JOBSCOUT_RUN_IN_TABS", "true");
        map.insert("JOBSCOUT_NAV_MAX_RETRIES", "7");
        map.insert("JOBSCOUT_SKIP_FRESH_SECS", "0");
        map.insert("LINKEDIN_EMAIL", "u@example.com");
        map.insert("LINKEDIN_PASSWORD", "hunter2");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.env, Environment::Production);
        assert!(cfg.run_in_tabs);
        assert_eq!(cfg.nav_max_retries, 7);
        assert_eq!(cfg.skip_fresh_secs, 0);
        assert!(cfg.linkedin.is_complete());
    }

    #[test]
    fn build_app_config_rejects_invalid_bool() {
        let mut map = HashMap::new();
        map.insert("JOBSCOUT_RUN_IN_TABS", "yes");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "JOBSCOUT_RUN_IN_TABS"),
            "expected InvalidEnvVar(JOBSCOUT_RUN_IN_TABS), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_rejects_invalid_retries() {
        let mut map = HashMap::new();
        map.insert("JOBSCOUT_NAV_MAX_RETRIES", "not-a-number");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "JOBSCOUT_NAV_MAX_RETRIES"),
            "expected InvalidEnvVar(JOBSCOUT_NAV_MAX_RETRIES), got: {result:?}"
        );
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let mut map = HashMap::new();
        map.insert("LINKEDIN_EMAIL", "u@example.com");
        map.insert("LINKEDIN_PASSWORD", "hunter2");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("u@example.com"));
        assert!(rendered.contains("[configured]"));
    }
}
