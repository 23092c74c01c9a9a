use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConflictError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Insufficient funds: {required:.0} required, {available:.0} available")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConflictError>;
