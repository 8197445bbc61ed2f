use thiserror::Error;

pub mod app_config;
pub mod cadence;
pub mod config;
pub mod crawlers;
pub mod interval;

pub use app_config::{AppConfig, Environment};
pub use cadence::{resolve_timer, ResolvedCadence};
pub use config::{load_app_config, load_app_config_from_env};
pub use crawlers::{load_crawlers, CrawlerConfig, CrawlersFile};
pub use interval::parse_interval;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read crawler config {path}: {source}")]
    CrawlersFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse crawler config: {0}")]
    CrawlersFileParse(#[from] serde_yaml::Error),

    #[error("{0}")]
    Validation(String),
}
