//! Error types for embed-compare operations

use thiserror::Error;

/// Result type alias for benchmark operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors that can occur while configuring or executing a benchmark
#[derive(Error, Debug)]
pub enum BenchError {
    /// Unknown model id or provider at submission time
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider exists but is not usable (missing credentials, failed availability check)
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// An embed call failed
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Index construction or search failed
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// Dataset or request failed validation
    #[error("validation error: {0}")]
    Validation(String),

    /// No run registered under the given id
    #[error("run '{0}' not found")]
    RunNotFound(String),
}
