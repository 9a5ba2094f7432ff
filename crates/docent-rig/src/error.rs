//! Error types for docent-rig.

use std::fmt;

use docent_vector::VectorError;

/// Result type alias for rig operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while answering or indexing.
///
/// A refused query is not an error; see [`ChatOutcome`](crate::chat::ChatOutcome).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Empty or malformed input. Returned before any upstream call.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The embedder rejected the input or returned an unusable vector.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The embedder or the vector store could not be reached.
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable { service: String, message: String },

    /// The language model failed, before or during streaming.
    #[error("generation error: {0}")]
    Generation(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Creates an invalid input error.
    pub fn invalid_input(message: impl fmt::Display) -> Self {
        Self::InvalidInput(message.to_string())
    }

    /// Creates an embedding error.
    pub fn embedding(message: impl fmt::Display) -> Self {
        Self::Embedding(message.to_string())
    }

    /// Creates an upstream unavailable error.
    pub fn upstream(service: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::UpstreamUnavailable {
            service: service.to_string(),
            message: message.to_string(),
        }
    }

    /// Creates a generation error.
    pub fn generation(message: impl fmt::Display) -> Self {
        Self::Generation(message.to_string())
    }

    /// Creates a configuration error.
    pub fn config(message: impl fmt::Display) -> Self {
        Self::Config(message.to_string())
    }

    /// Returns true if the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Embedding(_) | Self::UpstreamUnavailable { .. } | Self::Generation(_)
        )
    }
}

impl From<VectorError> for Error {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::InvalidConfig(message) => Self::Config(message),
            other => Self::upstream("vector store", other),
        }
    }
}
