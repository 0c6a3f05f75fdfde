use std::error::Error;
use thiserror::Error;

/// Result alias for session store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure reported by a session store, whatever database sits behind it.
///
/// Rejected guards and missing documents are not errors; they travel as
/// [`UpdateOutcome`](crate::dao::models::UpdateOutcome) values.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the request; `message` is surfaced verbatim.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Backend that failed, e.g. `couchdb`.
        backend: &'static str,
        /// Backend-specific description.
        message: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Wrap a failure of `backend`, keeping its display text as the message.
    pub fn unavailable<E>(backend: &'static str, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        StorageError::Unavailable {
            backend,
            message: source.to_string(),
            source: Box::new(source),
        }
    }

    /// Name of the backend that failed.
    pub fn backend(&self) -> &'static str {
        match self {
            StorageError::Unavailable { backend, .. } => backend,
        }
    }
}
