use thiserror::Error;

/// Result type for blob operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob operations
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Container '{container}' is unavailable: {reason}")]
    ContainerUnavailable { container: String, reason: String },

    #[error("Write to '{key}' failed: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Write to '{key}' timed out after {after:?}")]
    TimedOut {
        key: String,
        after: std::time::Duration,
    },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn container_unavailable<C: Into<String>, R: Into<String>>(container: C, reason: R) -> Self {
        Self::ContainerUnavailable {
            container: container.into(),
            reason: reason.into(),
        }
    }

    /// Create a write failure for the given object key
    pub fn write_failed<K: Into<String>, R: Into<String>>(key: K, reason: R) -> Self {
        Self::WriteFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
