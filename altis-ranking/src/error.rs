use altis_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Unknown feature column: {0}")]
    UnknownColumn(String),
    #[error("Feature matrix is missing column {0}")]
    MissingColumn(String),
    #[error("Model returned {actual} probabilities for {expected} rows")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("Model inference failed: {0}")]
    Inference(String),
}

pub type RankingResult<T> = Result<T, RankingError>;
