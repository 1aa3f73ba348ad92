//! Per-request error taxonomy and status mapping

use std::fmt;

use thiserror::Error;

/// Client-visible error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    MethodNotAllowed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::BadRequest => "BadRequest",
            Self::MethodNotAllowed => "MethodNotAllowed",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::BadRequest => 400,
            Self::MethodNotAllowed => 405,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error that ends a single request.
///
/// The detail is kept for logging; only uploads expose it to the caller.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("object not found: {key}: {detail}")]
    NotFound { key: String, detail: String },

    #[error("failed to upload object {key}: {detail}")]
    UploadFailed { key: String, detail: String },

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
}

impl ProxyError {
    pub fn not_found(key: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::NotFound {
            key: key.into(),
            detail: detail.to_string(),
        }
    }

    pub fn upload_failed(key: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::UploadFailed {
            key: key.into(),
            detail: detail.to_string(),
        }
    }

    pub fn method_not_allowed(method: impl Into<String>) -> Self {
        Self::MethodNotAllowed(method.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UploadFailed { .. } => ErrorKind::BadRequest,
            Self::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
        }
    }

    pub fn http_status(&self) -> u16 {
        self.kind().http_status()
    }

    /// Plain-text response body, if this error carries one
    pub fn body(&self) -> Option<String> {
        match self {
            Self::UploadFailed { .. } => Some(self.to_string()),
            Self::NotFound { .. } | Self::MethodNotAllowed(_) => None,
        }
    }
}
