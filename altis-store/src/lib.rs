pub mod app_config;
pub mod reference;

pub use app_config::Config;
pub use reference::{build_context, load_airports, load_model};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Ranking(#[from] altis_ranking::RankingError),
}

pub type StoreResult<T> = Result<T, StoreError>;
