//! Proxy service state and router

use crate::handlers::dispatch;
use crate::storage::{EphemeralStorage, ObjectBackend};
use axum::Router;
use std::sync::Arc;

/// Shared, read-only state for all requests
pub struct ProxyState {
    pub storage: Arc<dyn ObjectBackend>,
    /// Prepended verbatim to every request path
    pub prefix: String,
}

impl ProxyState {
    pub fn new(storage: Arc<dyn ObjectBackend>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    /// Proxy over a fresh in-memory bucket
    pub fn ephemeral(prefix: impl Into<String>) -> Self {
        Self::new(Arc::new(EphemeralStorage::new()), prefix)
    }
}

/// Router sending every path and method to the dispatcher
pub fn router(state: Arc<ProxyState>) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}
