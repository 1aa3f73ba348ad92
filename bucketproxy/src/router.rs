//! HTTP router for the proxy listener

use axum::{middleware, Router};
use bucketproxy_objects::ProxyState;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::metrics::{track, ProxyMetrics};

/// Create the proxy router with request tracing and metrics
pub fn create_router(state: Arc<ProxyState>, metrics: Arc<ProxyMetrics>) -> Router {
    bucketproxy_objects::router(state)
        .layer(middleware::from_fn_with_state(metrics, track))
        .layer(TraceLayer::new_for_http())
}
