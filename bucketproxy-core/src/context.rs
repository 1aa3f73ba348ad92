//! Per-request context

use crate::key::resolve;
use crate::request_id::RequestId;

/// Everything the dispatcher knows about one request.
///
/// Built once per request and passed down by reference; nothing in it is
/// shared with other requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub method: String,
    /// Decoded request path, as received
    pub path: String,
    /// Backend object key derived from `path` and the configured prefix
    pub key: String,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>, prefix: &str) -> Self {
        let path = path.into();
        let key = resolve(prefix, &path);
        Self {
            request_id: RequestId::new(),
            method: method.into(),
            path,
            key,
        }
    }
}
