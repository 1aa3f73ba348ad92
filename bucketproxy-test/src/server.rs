//! Test server management

use bucketproxy_objects::storage::EphemeralStorage;
use bucketproxy_objects::{router, ObjectBackend, ProxyState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

/// A proxy served in-process on an ephemeral local port
pub struct TestServer {
    task: JoinHandle<()>,
    base_url: String,
}

impl TestServer {
    /// Start a proxy over a fresh in-memory bucket
    pub async fn start(prefix: &str) -> Result<Self, TestError> {
        Self::with_storage(Arc::new(EphemeralStorage::new()), prefix).await
    }

    /// Start a proxy over the given backend
    pub async fn with_storage(
        storage: Arc<dyn ObjectBackend>,
        prefix: &str,
    ) -> Result<Self, TestError> {
        storage
            .probe()
            .await
            .map_err(|e| TestError::StartFailed(e.to_string()))?;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = router(Arc::new(ProxyState::new(storage, prefix)));

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "test server failed");
            }
        });

        info!(port = addr.port(), "bucketproxy test server ready");
        Ok(Self {
            task,
            base_url: format!("http://{addr}"),
        })
    }

    /// Get a client for this server
    pub fn client(&self) -> crate::ProxyClient {
        crate::ProxyClient::new(self.base_url.clone())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Errors that can occur with test server
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error("failed to bind test listener: {0}")]
    Bind(#[from] std::io::Error),

    #[error("failed to start server: {0}")]
    StartFailed(String),
}
