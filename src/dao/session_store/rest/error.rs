//! Error types shared by the REST storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`RestDaoError`] failures.
pub type RestResult<T> = Result<T, RestDaoError>;

/// Failures that can occur while talking to the hosted store.
#[derive(Debug, Error)]
pub enum RestDaoError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build store client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send store request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The store returned an unexpected status code.
    #[error("unexpected store response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode store response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A row carried a timestamp that is not valid RFC 3339.
    #[error("invalid timestamp in store row for `{path}`")]
    InvalidTimestamp {
        path: String,
        #[source]
        source: time::error::Parse,
    },
    /// A count response was missing or carried an unparsable range header.
    #[error("missing or invalid count header for `{path}`")]
    InvalidCountHeader { path: String },
}

impl From<RestDaoError> for StorageError {
    fn from(err: RestDaoError) -> Self {
        match &err {
            RestDaoError::RequestStatus { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN =>
            {
                StorageError::PermissionDenied
            }
            _ => StorageError::unavailable(err.to_string(), err),
        }
    }
}
