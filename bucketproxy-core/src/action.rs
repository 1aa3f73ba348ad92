//! HTTP method to proxy action selection

use crate::error::ProxyError;

/// What a request asks the proxy to do with its object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stream the object back to the caller (`GET`)
    Download,
    /// Report whether the object exists (`HEAD`)
    ExistenceCheck,
    /// Create or overwrite the object from the request body (`POST`, `PUT`)
    Upload,
}

impl Action {
    /// Select the action for an HTTP method name.
    ///
    /// Method names are case-sensitive, as in HTTP.
    pub fn from_method(method: &str) -> Result<Self, ProxyError> {
        match method {
            "GET" => Ok(Self::Download),
            "HEAD" => Ok(Self::ExistenceCheck),
            "POST" | "PUT" => Ok(Self::Upload),
            other => Err(ProxyError::method_not_allowed(other)),
        }
    }
}
