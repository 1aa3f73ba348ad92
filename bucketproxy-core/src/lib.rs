//! Core types for bucketproxy
//!
//! This crate holds the I/O-free parts of the proxy: mapping request paths to
//! object keys, choosing an action from the HTTP method, per-request context,
//! and the error-to-status table shared by every backend.

pub mod action;
pub mod context;
pub mod error;
pub mod key;
pub mod request_id;

pub use action::Action;
pub use context::RequestContext;
pub use error::{ErrorKind, ProxyError};
pub use key::resolve;
pub use request_id::{RequestId, REQUEST_ID_HEADER};
