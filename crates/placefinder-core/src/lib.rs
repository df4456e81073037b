pub mod app_config;
pub mod config;
pub mod history;
pub mod search;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use history::{SavedSearch, SavedSearchSummary};
pub use search::{
    normalize_result_limit, rating_label, Coordinates, EnrichedResult, OpenStatus, ResultStub,
    SearchRequest, DEFAULT_RESULT_LIMIT, MAX_RESULT_LIMIT, NOT_AVAILABLE, NOT_RATED,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
