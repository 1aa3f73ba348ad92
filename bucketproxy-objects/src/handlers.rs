//! Request dispatcher: HTTP method + path to storage action

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::Response,
};
use bucketproxy_core::{Action, ProxyError, RequestContext, REQUEST_ID_HEADER};
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::service::ProxyState;
use crate::transfer;

/// Entry point for every proxied request, whatever its path
pub async fn dispatch(
    State(state): State<Arc<ProxyState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let path = percent_decode_str(uri.path()).decode_utf8_lossy().into_owned();
    let ctx = RequestContext::new(method.as_str(), path, &state.prefix);

    let span = info_span!(
        "request",
        request_id = %ctx.request_id,
        method = %ctx.method,
        key = %ctx.key,
    );

    async move {
        let result = match Action::from_method(&ctx.method) {
            Ok(Action::Download) => download(&state, &ctx).await,
            Ok(Action::ExistenceCheck) => check_exists(&state, &ctx).await,
            Ok(Action::Upload) => upload(&state, &ctx, content_type(&headers), body).await,
            Err(e) => Err(e),
        };

        let mut response = match result {
            Ok(response) => response,
            Err(e) => error_response(&e),
        };

        if let Ok(value) = HeaderValue::from_str(ctx.request_id.as_str()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        info!(path = %ctx.path, status = response.status().as_u16(), "request completed");
        response
    }
    .instrument(span)
    .await
}

// === Actions ===

async fn download(state: &ProxyState, ctx: &RequestContext) -> Result<Response, ProxyError> {
    let metadata = state
        .storage
        .metadata(&ctx.key)
        .await
        .map_err(|e| ProxyError::not_found(&ctx.key, e))?;

    let reader = state
        .storage
        .open_reader(&ctx.key)
        .await
        .map_err(|e| ProxyError::not_found(&ctx.key, e))?;

    let body = transfer::response_body(reader)
        .await
        .map_err(|e| ProxyError::not_found(&ctx.key, e))?;

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    if let Some(value) = metadata
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }

    debug!(size = ?metadata.size, "streaming object");
    Ok(response)
}

async fn check_exists(state: &ProxyState, ctx: &RequestContext) -> Result<Response, ProxyError> {
    state
        .storage
        .metadata(&ctx.key)
        .await
        .map_err(|e| ProxyError::not_found(&ctx.key, e))?;

    Ok(empty(StatusCode::OK))
}

async fn upload(
    state: &ProxyState,
    ctx: &RequestContext,
    content_type: Option<String>,
    body: Body,
) -> Result<Response, ProxyError> {
    let mut writer = state
        .storage
        .open_writer(&ctx.key, content_type.as_deref())
        .await
        .map_err(|e| ProxyError::upload_failed(&ctx.key, e))?;

    let mut source = transfer::request_reader(body);

    // The writer is consumed by exactly one of commit/abort below.
    match transfer::copy(&mut source, &mut writer).await {
        Ok(copied) => {
            let size = writer
                .commit()
                .await
                .map_err(|e| ProxyError::upload_failed(&ctx.key, e))?;
            debug!(copied, size, "upload committed");
            Ok(empty(StatusCode::CREATED))
        }
        Err(e) => {
            writer.abort().await;
            Err(ProxyError::upload_failed(&ctx.key, e))
        }
    }
}

// === Helper Functions ===

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn empty(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn error_response(err: &ProxyError) -> Response {
    match err {
        ProxyError::MethodNotAllowed(method) => warn!(method = %method, "method not allowed"),
        ProxyError::NotFound { .. } => debug!(error = %err, "object not available"),
        ProxyError::UploadFailed { .. } => error!(error = %err, "upload failed"),
    }

    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    match err.body() {
        Some(message) => {
            let mut response = Response::new(Body::from(message));
            *response.status_mut() = status;
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            response
        }
        None => empty(status),
    }
}
