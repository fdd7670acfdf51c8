//! Error types for the facility-management client.
//!
//! # Design
//! Two failure kinds matter to callers. `Validation` is raised before any
//! network activity when a required input is missing. `Request` wraps the
//! normalized [`FmRequestError`] produced for every non-2xx response, no
//! matter what shape the upstream error body had. Transport failures are
//! passed through as the transport's own error value.

use serde_json::Value;
use thiserror::Error;

/// Message used when a request error is raised without an override.
pub const DEFAULT_REQUEST_ERROR_MESSAGE: &str = "VertiGIS FM request failed.";

/// Boxed error returned by a [`Transport`](crate::transport::Transport).
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// A non-2xx response, normalized.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (HTTP {status_code})")]
pub struct FmRequestError {
    /// HTTP status of the failed response.
    pub status_code: u16,
    /// Best-effort parsed error body. `None` when the body was not JSON or
    /// could not be read.
    pub error: Option<Value>,
    pub message: String,
}

impl FmRequestError {
    pub fn new(status_code: u16, error: Option<Value>, message: Option<&str>) -> Self {
        Self {
            status_code,
            error,
            message: message.unwrap_or(DEFAULT_REQUEST_ERROR_MESSAGE).to_string(),
        }
    }
}

/// Errors returned by every client operation.
#[derive(Debug, Error)]
pub enum FmError {
    /// A required input was missing or empty. No request was sent.
    #[error("{0}")]
    Validation(String),

    /// The service answered with a non-2xx status.
    #[error(transparent)]
    Request(#[from] FmRequestError),

    /// The transport failed before a response was available.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// The request body could not be encoded as JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A successful response body could not be decoded.
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),
}

impl FmError {
    pub(crate) fn required(field: &str) -> Self {
        FmError::Validation(format!("{field} is required"))
    }

    /// HTTP status of a request failure, if this is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FmError::Request(err) => Some(err.status_code),
            _ => None,
        }
    }
}
