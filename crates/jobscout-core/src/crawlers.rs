//! Crawler registry loaded from `config/crawlers.yaml`.
//!
//! One entry per job site: its default run interval, optional time-of-day
//! interval overrides, scheduling flags, and the keywords it searches.
//! The registry is loaded once at process start and never mutated.
//!
//! Window *bounds* (`"7-18"`) are deliberately not validated here — the
//! cadence resolver parses them at resolution time so a malformed window
//! fails with an error tied to the crawler being scheduled.

use std::collections::HashSet;
use std::path::Path;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::interval::parse_interval;
use crate::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Unique crawler name; also the state key and the site registry key.
    pub name: String,
    /// Default run interval, e.g. `"10m"` or `"2h"`.
    pub interval: String,
    /// Time-of-day overrides keyed by `"<startHour>-<endHour>"`, in
    /// declaration order. The first window containing the current hour wins.
    #[serde(default, deserialize_with = "ordered_windows")]
    pub windows: Vec<(String, String)>,
    /// Excluded from scheduled passes unless explicitly named.
    #[serde(default)]
    pub ignore_auto_run: bool,
    /// Close the site tab after each run instead of keeping the session warm.
    #[serde(default)]
    pub close_tab: bool,
    /// Search terms driving the crawl passes, one crawl cycle per keyword.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Optional search location filter.
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CrawlersFile {
    pub crawlers: Vec<CrawlerConfig>,
}

impl CrawlersFile {
    /// Case-insensitive lookup returning the canonically-cased config.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CrawlerConfig> {
        self.crawlers
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Resolves `name` case-insensitively to the configured canonical name.
    #[must_use]
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        self.get(name).map(|c| c.name.as_str())
    }
}

/// Deserializes a YAML mapping into ordered `(key, value)` pairs.
///
/// A plain map type would lose declaration order, which the cadence
/// resolver needs for first-match-wins window selection.
fn ordered_windows<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct WindowsVisitor;

    impl<'de> Visitor<'de> for WindowsVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a mapping of \"<startHour>-<endHour>\" to interval strings")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, String>()? {
                pairs.push((key, value));
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(WindowsVisitor)
}

/// Load and validate the crawler registry from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails
/// validation.
pub fn load_crawlers(path: &Path) -> Result<CrawlersFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CrawlersFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let crawlers_file: CrawlersFile = serde_yaml::from_str(&content)?;

    validate_crawlers(&crawlers_file)?;

    Ok(crawlers_file)
}

fn validate_crawlers(crawlers_file: &CrawlersFile) -> Result<(), ConfigError> {
    if crawlers_file.crawlers.is_empty() {
        return Err(ConfigError::Validation(
            "crawler config defines no crawlers".to_string(),
        ));
    }

    let mut seen_names = HashSet::new();

    for crawler in &crawlers_file.crawlers {
        if crawler.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "crawler name must be non-empty".to_string(),
            ));
        }

        if !seen_names.insert(crawler.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate crawler name: '{}'",
                crawler.name
            )));
        }

        parse_interval(&crawler.interval).map_err(|e| {
            ConfigError::Validation(format!(
                "crawler '{}' has an invalid default interval: {e}",
                crawler.name
            ))
        })?;

        if crawler.keywords.is_empty() {
            return Err(ConfigError::Validation(format!(
                "crawler '{}' has no keywords configured",
                crawler.name
            )));
        }
        if crawler.keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "crawler '{}' has an empty keyword",
                crawler.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> CrawlersFile {
        serde_yaml::from_str(yaml).expect("fixture must parse")
    }

    const VALID: &str = r#"
crawlers:
  - name: Infojobs
    interval: 2h
    windows:
      "7-18": 1h
      "18-23": 3h
    keywords: [rust, backend]
    location: Madrid
  - name: Linkedin
    interval: 10m
    ignore_auto_run: true
    close_tab: true
    keywords: ["data engineer"]
"#;

    #[test]
    fn parses_full_registry() {
        let file = parse(VALID);
        validate_crawlers(&file).unwrap();
        assert_eq!(file.crawlers.len(), 2);

        let infojobs = &file.crawlers[0];
        assert_eq!(infojobs.name, "Infojobs");
        assert_eq!(
            infojobs.windows,
            vec![
                ("7-18".to_string(), "1h".to_string()),
                ("18-23".to_string(), "3h".to_string()),
            ]
        );
        assert!(!infojobs.ignore_auto_run);
        assert_eq!(infojobs.location.as_deref(), Some("Madrid"));

        let linkedin = &file.crawlers[1];
        assert!(linkedin.ignore_auto_run);
        assert!(linkedin.close_tab);
        assert!(linkedin.windows.is_empty());
    }

    #[test]
    fn windows_preserve_declaration_order() {
        // An overlapping second window must stay second.
        let file = parse(
            r#"
crawlers:
  - name: Infojobs
    interval: 2h
    windows:
      "9-17": 30m
      "7-18": 1h
    keywords: [rust]
"#,
        );
        assert_eq!(file.crawlers[0].windows[0].0, "9-17");
        assert_eq!(file.crawlers[0].windows[1].0, "7-18");
    }

    #[test]
    fn lookup_is_case_insensitive_with_canonical_result() {
        let file = parse(VALID);
        assert_eq!(file.canonical_name("infojobs"), Some("Infojobs"));
        assert_eq!(file.canonical_name("LINKEDIN"), Some("Linkedin"));
        assert_eq!(file.canonical_name("glassdoor"), None);
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let file = parse(
            r#"
crawlers:
  - name: Linkedin
    interval: 1h
    keywords: [rust]
  - name: linkedin
    interval: 2h
    keywords: [rust]
"#,
        );
        let err = validate_crawlers(&file).unwrap_err();
        assert!(err.to_string().contains("duplicate crawler name"));
    }

    #[test]
    fn validate_rejects_bad_default_interval() {
        let file = parse(
            r#"
crawlers:
  - name: Linkedin
    interval: soon
    keywords: [rust]
"#,
        );
        let err = validate_crawlers(&file).unwrap_err();
        assert!(err.to_string().contains("invalid default interval"));
    }

    #[test]
    fn validate_rejects_missing_keywords() {
        let file = parse(
            r#"
crawlers:
  - name: Linkedin
    interval: 1h
"#,
        );
        let err = validate_crawlers(&file).unwrap_err();
        assert!(err.to_string().contains("no keywords"));
    }

    #[test]
    fn validate_accepts_unvalidated_window_bounds() {
        // Bound validation is the cadence resolver's job, not load's.
        let file = parse(
            r#"
crawlers:
  - name: Linkedin
    interval: 1h
    windows:
      "22-6": 4h
    keywords: [rust]
"#,
        );
        assert!(validate_crawlers(&file).is_ok());
    }

    #[test]
    fn load_crawlers_from_real_file() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config")
            .join("crawlers.yaml");
        assert!(
            path.exists(),
            "crawlers.yaml missing at {path:?} — required for this test"
        );
        let result = load_crawlers(&path);
        assert!(result.is_ok(), "failed to load crawlers.yaml: {result:?}");
        assert!(!result.unwrap().crawlers.is_empty());
    }
}
