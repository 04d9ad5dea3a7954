use thiserror::Error;

#[derive(Error, Debug)]
pub enum VizError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Malformed trajectory: {0}")]
    MalformedTrajectory(String),

    #[error("Invalid simulation result: {0}")]
    InvalidSimulationResult(String),

    #[error("Model '{key}' not found in registry")]
    UnknownModel { key: String },

    #[error("Engine rejected {op} for primitive '{id}': {reason}")]
    EngineSyncFailure {
        op:     &'static str,
        id:     String,
        reason: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type VizResult<T> = Result<T, VizError>;
