pub mod app_config;
pub mod config;
pub mod extraction;
pub mod retailers;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, DEFAULT_USER_AGENT};
pub use extraction::{
    AttemptOutcome, ErrorCategory, ExtractionAttempt, PriceExtractionResult, Tier,
};
pub use retailers::{load_retailers, parse_retailers, RetailerConfig, RetailersFile};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read retailers file {path}: {source}")]
    RetailersFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse retailers file: {0}")]
    RetailersFileParse(#[from] serde_yaml::Error),

    #[error("retailer config validation failed: {0}")]
    Validation(String),
}
