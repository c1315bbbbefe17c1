use thiserror::Error;

use crate::domain::ResolutionState;

#[derive(Debug, Error)]
pub enum WeftError {
    #[error("executor not found: name={0}")]
    UnknownExecutor(String),

    /// Resolve attempted on a value that already left `Pending`.
    #[error("value already resolved (state={state})")]
    ResolutionConflict { state: ResolutionState },

    #[error("invalid executor config for name={name}: {reason}")]
    InvalidExecutor { name: String, reason: String },

    /// The producing side was dropped before it resolved the value.
    #[error("observation abandoned before resolution")]
    Abandoned,

    #[error("config decode: {0}")]
    Config(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
