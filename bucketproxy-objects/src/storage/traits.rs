//! Storage backend traits

use std::pin::Pin;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("Bucket not reachable: {0}")]
    BucketUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Object metadata, fetched fresh on every request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

/// Readable byte stream of a stored object. Dropping it releases the backend
/// connection or file handle.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Writable sink for a single object.
///
/// Bytes written are not visible until [`ObjectWriter::commit`] succeeds.
/// Both `commit` and `abort` consume the writer, so a sink is finalized at
/// most once; dropping an unfinalized writer behaves like `abort`.
#[async_trait]
pub trait ObjectWriter: AsyncWrite + Send + Unpin {
    /// Publish the written bytes under the writer's key, returning the size
    async fn commit(self: Box<Self>) -> Result<u64, StorageError>;

    /// Discard everything written so far and release the sink
    async fn abort(self: Box<Self>);
}

/// Abstract storage backend trait, bound to a single bucket
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Check that the bucket is reachable
    async fn probe(&self) -> Result<(), StorageError>;

    /// Fetch object metadata. Missing objects are `ObjectNotFound`.
    async fn metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError>;

    /// Open an object for reading
    async fn open_reader(&self, key: &str) -> Result<ObjectReader, StorageError>;

    /// Open a sink that creates or overwrites the object on commit
    async fn open_writer(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<Box<dyn ObjectWriter>, StorageError>;
}
