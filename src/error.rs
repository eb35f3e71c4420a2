//! Tensor error types

/// Tensor error types
///
/// `Clone` because a failed batch fans the same error out to every waiter
/// in that batch.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum TensorError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider authentication failed")]
    AuthenticationFailed,

    // Gateway errors
    #[error("unauthorized")]
    Unauthorized,

    #[error("no adapter available")]
    NoAdapter,

    #[error("operation not implemented: {0}")]
    NotImplemented(String),

    /// In-process model inference failed.
    #[error("inference failed: {0}")]
    Inference(String),

    /// Adapter returned a different number of vectors than it was given texts.
    #[error("adapter returned {got} vectors for {expected} inputs")]
    LengthMismatch { expected: usize, got: usize },

    /// The submitter's deadline elapsed before fan-out reached its waiter.
    #[error("embed request timed out waiting for batch dispatch")]
    SubmitTimeout,

    #[error("gateway is shutting down")]
    Shutdown,

    // Data errors
    #[error("JSON error: {0}")]
    Json(String),

    // Cache errors are degraded (read → all-miss, write → swallowed) and
    // never reach a caller; the variant exists for the store seam itself.
    #[error("cache error: {0}")]
    Cache(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<serde_json::Error> for TensorError {
    fn from(err: serde_json::Error) -> Self {
        TensorError::Json(err.to_string())
    }
}

impl From<reqwest::Error> for TensorError {
    fn from(err: reqwest::Error) -> Self {
        TensorError::Http(err.to_string())
    }
}

impl From<redis::RedisError> for TensorError {
    fn from(err: redis::RedisError) -> Self {
        TensorError::Cache(err.to_string())
    }
}

/// Result type alias for Tensor operations
pub type Result<T> = std::result::Result<T, TensorError>;
