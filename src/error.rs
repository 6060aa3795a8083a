/// Engine-level errors
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Data port error: {0}")]
    Port(String),

    #[error("Invalid result: {0}")]
    InvalidResult(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True for caller mistakes that must be rejected at the call boundary
    /// rather than converted into an empty result.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_) | EngineError::UnknownAlgorithm(_)
        )
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
