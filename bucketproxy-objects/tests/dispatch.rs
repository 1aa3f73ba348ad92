//! Dispatcher tests driven through the router with `tower::ServiceExt`

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use bucketproxy_objects::storage::{
    EphemeralStorage, ObjectBackend, ObjectMetadata, ObjectReader, ObjectWriter, StorageError,
};
use bucketproxy_objects::{router, ProxyState};
use bytes::Bytes;
use http_body_util::BodyExt;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tower::ServiceExt;

fn app(storage: Arc<dyn ObjectBackend>, prefix: &str) -> Router {
    router(Arc::new(ProxyState::new(storage, prefix)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body)
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

// =============================================================================
// INSTRUMENTED BACKENDS
// =============================================================================

/// Wraps an in-memory bucket, counting writer finalizations and optionally
/// failing writes after a byte budget, failing every lookup or rejecting
/// commits.
#[derive(Default)]
struct RecordingBackend {
    inner: EphemeralStorage,
    write_budget: Option<usize>,
    fail_lookups: bool,
    fail_reads: bool,
    fail_commit: bool,
    commits: Arc<AtomicUsize>,
    aborts: Arc<AtomicUsize>,
}

#[async_trait]
impl ObjectBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn probe(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        if self.fail_lookups {
            return Err(StorageError::Backend("lookup unavailable".to_string()));
        }
        self.inner.metadata(key).await
    }

    async fn open_reader(&self, key: &str) -> Result<ObjectReader, StorageError> {
        if self.fail_reads {
            return Ok(Box::pin(BrokenReader));
        }
        self.inner.open_reader(key).await
    }

    async fn open_writer(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<Box<dyn ObjectWriter>, StorageError> {
        Ok(Box::new(RecordingWriter {
            inner: self.inner.open_writer(key, content_type).await?,
            budget: self.write_budget,
            fail_commit: self.fail_commit,
            commits: Arc::clone(&self.commits),
            aborts: Arc::clone(&self.aborts),
        }))
    }
}

struct RecordingWriter {
    inner: Box<dyn ObjectWriter>,
    budget: Option<usize>,
    fail_commit: bool,
    commits: Arc<AtomicUsize>,
    aborts: Arc<AtomicUsize>,
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let buf = match self.budget {
            Some(0) => {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "backend write rejected")))
            }
            Some(budget) => &buf[..budget.min(buf.len())],
            None => buf,
        };
        let poll = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let (Poll::Ready(Ok(n)), Some(budget)) = (&poll, self.budget) {
            self.budget = Some(budget - n);
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[async_trait]
impl ObjectWriter for RecordingWriter {
    async fn commit(self: Box<Self>) -> Result<u64, StorageError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail_commit {
            self.inner.abort().await;
            return Err(StorageError::Backend("commit rejected".to_string()));
        }
        self.inner.commit().await
    }

    async fn abort(self: Box<Self>) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort().await;
    }
}

struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "stream reset")))
    }
}

// =============================================================================
// DOWNLOAD / EXISTENCE
// =============================================================================

#[tokio::test]
async fn test_get_existing_object() {
    let storage = EphemeralStorage::new();
    storage.insert("team/data.json", r#"{"a":1}"#, "application/json");
    let app = app(Arc::new(storage), "team/");

    let response = send(&app, Method::GET, "/data.json", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_bytes(response).await.as_ref(), br#"{"a":1}"#);
}

#[tokio::test]
async fn test_get_missing_object() {
    let app = app(Arc::new(EphemeralStorage::new()), "team/");

    let response = send(&app, Method::GET, "/data.json", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_get_with_failing_metadata_is_not_found() {
    let storage = RecordingBackend {
        fail_lookups: true,
        ..Default::default()
    };
    storage.inner.insert("k", "v", "text/plain");
    let app = app(Arc::new(storage), "");

    let response = send(&app, Method::GET, "/k", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_with_unreadable_object_is_not_found() {
    let storage = RecordingBackend {
        fail_reads: true,
        ..Default::default()
    };
    storage.inner.insert("k", "v", "text/plain");
    let app = app(Arc::new(storage), "");

    let response = send(&app, Method::GET, "/k", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().get(header::CONTENT_TYPE).is_none());
}

#[tokio::test]
async fn test_get_decodes_percent_encoded_path() {
    let storage = EphemeralStorage::new();
    storage.insert("reports/q1 summary.txt", "ok", "text/plain");
    let app = app(Arc::new(storage), "");

    let response = send(&app, Method::GET, "/reports/q1%20summary.txt", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.as_ref(), b"ok");
}

#[tokio::test]
async fn test_head_existing_object() {
    let storage = EphemeralStorage::new();
    storage.insert("present", "some bytes", "text/plain");
    let app = app(Arc::new(storage), "");

    let response = send(&app, Method::HEAD, "/present", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_head_missing_object() {
    let app = app(Arc::new(EphemeralStorage::new()), "");

    let response = send(&app, Method::HEAD, "/absent", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_head_with_failing_metadata_is_not_found() {
    let storage = RecordingBackend {
        fail_lookups: true,
        ..Default::default()
    };
    let app = app(Arc::new(storage), "");

    let response = send(&app, Method::HEAD, "/anything", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// UPLOAD
// =============================================================================

#[tokio::test]
async fn test_put_then_get_round_trip() {
    let storage = EphemeralStorage::new();
    let app = app(Arc::new(storage.clone()), "team/");

    let request = Request::builder()
        .method(Method::PUT)
        .uri("/data.json")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"a":1}"#))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(storage.contains("team/data.json"));

    let response = send(&app, Method::GET, "/data.json", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(body_bytes(response).await.as_ref(), br#"{"a":1}"#);
}

#[tokio::test]
async fn test_post_uploads_like_put() {
    let storage = EphemeralStorage::new();
    let app = app(Arc::new(storage.clone()), "");

    let response = send(&app, Method::POST, "/cache/entry", Body::from("payload")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(storage.get("cache/entry").unwrap().as_ref(), b"payload");
}

#[tokio::test]
async fn test_upload_overwrites() {
    let storage = EphemeralStorage::new();
    storage.insert("obj", "old", "text/plain");
    let app = app(Arc::new(storage.clone()), "");

    let response = send(&app, Method::PUT, "/obj", Body::from("new")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(storage.get("obj").unwrap().as_ref(), b"new");
}

#[tokio::test]
async fn test_upload_commits_exactly_once() {
    let backend = RecordingBackend::default();
    let commits = Arc::clone(&backend.commits);
    let aborts = Arc::clone(&backend.aborts);
    let app = app(Arc::new(backend), "");

    let response = send(&app, Method::PUT, "/ok", Body::from("data")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(commits.load(Ordering::SeqCst), 1);
    assert_eq!(aborts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_upload_backend_write_failure() {
    let backend = RecordingBackend {
        write_budget: Some(3),
        ..Default::default()
    };
    let inner = backend.inner.clone();
    let commits = Arc::clone(&backend.commits);
    let aborts = Arc::clone(&backend.aborts);
    let app = app(Arc::new(backend), "");

    let response = send(&app, Method::PUT, "/broken", Body::from("more than three bytes")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain; charset=utf-8"
    );
    let message = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(message.contains("backend write rejected"), "{message}");

    assert_eq!(commits.load(Ordering::SeqCst), 0);
    assert_eq!(aborts.load(Ordering::SeqCst), 1);
    assert!(!inner.contains("broken"));
}

#[tokio::test]
async fn test_upload_commit_failure() {
    let backend = RecordingBackend {
        fail_commit: true,
        ..Default::default()
    };
    let inner = backend.inner.clone();
    let commits = Arc::clone(&backend.commits);
    let aborts = Arc::clone(&backend.aborts);
    let app = app(Arc::new(backend), "team/");

    let response = send(&app, Method::PUT, "/report.csv", Body::from("a,b\n")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain; charset=utf-8"
    );
    let message = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(message.contains("team/report.csv"), "{message}");
    assert!(message.contains("commit rejected"), "{message}");

    // The failed commit is the only finalization
    assert_eq!(commits.load(Ordering::SeqCst), 1);
    assert_eq!(aborts.load(Ordering::SeqCst), 0);
    assert!(!inner.contains("team/report.csv"));
}

#[tokio::test]
async fn test_upload_body_failure_mid_transfer() {
    let backend = RecordingBackend::default();
    let inner = backend.inner.clone();
    let commits = Arc::clone(&backend.commits);
    let aborts = Arc::clone(&backend.aborts);
    let app = app(Arc::new(backend), "");

    let chunks: Vec<Result<Bytes, io::Error>> = vec![
        Ok(Bytes::from_static(b"first chunk")),
        Err(io::Error::new(io::ErrorKind::UnexpectedEof, "client disconnected")),
    ];
    let body = Body::from_stream(futures::stream::iter(chunks));

    let response = send(&app, Method::PUT, "/partial", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let message = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(message.contains("partial"));

    assert_eq!(commits.load(Ordering::SeqCst), 0);
    assert_eq!(aborts.load(Ordering::SeqCst), 1);
    assert!(!inner.contains("partial"));
}

#[tokio::test]
async fn test_large_upload_round_trip() {
    let storage = EphemeralStorage::new();
    let app = app(Arc::new(storage), "");
    let data: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();

    let response = send(&app, Method::PUT, "/big.bin", Body::from(data.clone())).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, Method::GET, "/big.bin", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.as_ref(), data.as_slice());
}

// =============================================================================
// METHOD HANDLING
// =============================================================================

#[tokio::test]
async fn test_unsupported_methods_rejected() {
    let storage = EphemeralStorage::new();
    storage.insert("exists", "x", "text/plain");
    let app = app(Arc::new(storage.clone()), "");

    for method in [Method::DELETE, Method::PATCH, Method::OPTIONS, Method::TRACE] {
        for path in ["/exists", "/missing", "/"] {
            let response = send(&app, method.clone(), path, Body::empty()).await;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method} {path}");
            assert!(body_bytes(response).await.is_empty());
        }
    }

    assert!(storage.contains("exists"));
}

#[tokio::test]
async fn test_custom_method_rejected() {
    let app = app(Arc::new(EphemeralStorage::new()), "");
    let method = Method::from_bytes(b"PROPFIND").unwrap();

    let response = send(&app, method, "/any", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
