use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The query matched no rows.
    #[error("no rows found")]
    NoRows,
    /// Row-level security rejected the operation for the presented identity.
    #[error("permission denied by row-level security")]
    PermissionDenied,
    /// A concurrent writer won the race for the targeted row.
    #[error("write conflict on session `{code}`")]
    Conflict {
        /// Session code of the contested row.
        code: String,
    },
    /// A persisted row violates a compound invariant and needs repair.
    #[error("corrupt session row `{code}`: {detail}")]
    Corrupt {
        /// Session code of the corrupt row.
        code: String,
        /// Description of the violated invariant.
        detail: String,
    },
    /// The backend could not be reached or returned an unexpected failure.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying backend error, when one exists.
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// True for rows that violate a compound invariant and can be repaired
    /// in place.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StorageError::Corrupt { .. })
    }

    /// Machine-readable code surfaced verbatim by the health endpoint and in
    /// error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::NoRows => "no_rows",
            StorageError::PermissionDenied => "permission_denied",
            StorageError::Conflict { .. } => "conflict",
            StorageError::Corrupt { .. } => "corrupt_row",
            StorageError::Unavailable { .. } => "unavailable",
        }
    }
}
