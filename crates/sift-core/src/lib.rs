//! Shared configuration for the sift workspace.
//!
//! Environment-driven settings live in [`AppConfig`]; ranking weights and
//! selection limits live in a YAML file loaded into [`RankingConfig`].

mod app_config;
mod config;
mod ranking;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use ranking::{load_ranking_config, RankingConfig, RankingWeights};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid ranking config: {0}")]
    InvalidRanking(String),
}
