//! Object proxy for bucketproxy
//!
//! This crate maps GET, HEAD, POST and PUT requests onto a single storage
//! bucket and streams object bytes between the HTTP connection and the
//! backend.

pub mod handlers;
pub mod service;
pub mod storage;
pub mod transfer;

pub use service::{router, ProxyState};
pub use storage::{ObjectBackend, StorageError};
