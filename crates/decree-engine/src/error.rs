//! Engine error types

use thiserror::Error;

/// Engine error
///
/// These surface only through the error event channel; `run` itself never
/// fails once started.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Rule data could not be serialized or rebuilt after interpolation
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Interpolation pattern failed to compile
    #[error("Invalid interpolation pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
