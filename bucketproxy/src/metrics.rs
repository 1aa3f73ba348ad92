//! Prometheus request metrics and the telemetry endpoint

use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

/// Request counters and latency histograms, labelled by status code and method
pub struct ProxyMetrics {
    registry: Registry,
    requests: IntCounterVec,
    duration: HistogramVec,
}

impl ProxyMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of proxied HTTP requests"),
            &["code", "method"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new("http_duration_seconds", "Time spent serving proxied HTTP requests"),
            &["code", "method"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            requests,
            duration,
        })
    }

    pub fn observe(&self, code: u16, method: &str, seconds: f64) {
        let code = code.to_string();
        let labels = [code.as_str(), method];
        self.requests.with_label_values(&labels).inc();
        self.duration.with_label_values(&labels).observe(seconds);
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Label for a request method; anything non-standard shares one label so
/// clients cannot mint new series.
fn method_label(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "PATCH" => "PATCH",
        "OPTIONS" => "OPTIONS",
        "TRACE" => "TRACE",
        "CONNECT" => "CONNECT",
        _ => "other",
    }
}

/// Middleware recording every request that passes through the proxy router.
///
/// Latency covers the handler up to the response head; streamed bodies keep
/// flowing after it is recorded.
pub async fn track(State(metrics): State<Arc<ProxyMetrics>>, request: Request, next: Next) -> Response {
    let method = method_label(request.method());
    let start = Instant::now();

    let response = next.run(request).await;

    metrics.observe(response.status().as_u16(), method, start.elapsed().as_secs_f64());
    response
}

/// Router for the telemetry listener
pub fn telemetry_router(metrics: Arc<ProxyMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(serve_metrics))
        .with_state(metrics)
}

async fn serve_metrics(State(metrics): State<Arc<ProxyMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
