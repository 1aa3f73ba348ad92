//! In-memory ephemeral storage backend

use super::traits::*;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

/// Content type recorded when an upload does not name one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// In-memory stored object
struct InMemoryObject {
    data: Bytes,
    content_type: String,
}

/// Ephemeral (in-memory) storage backend holding a single bucket.
///
/// Cloning is cheap and clones share the same objects.
#[derive(Clone, Default)]
pub struct EphemeralStorage {
    objects: Arc<DashMap<String, InMemoryObject>>,
}

impl EphemeralStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object directly, bypassing the writer
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>, content_type: &str) {
        self.objects.insert(
            key.into(),
            InMemoryObject {
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    /// Raw bytes of a stored object
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.get(key).map(|obj| obj.data.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectBackend for EphemeralStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn probe(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        let obj = self
            .objects
            .get(key)
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))?;

        Ok(ObjectMetadata {
            content_type: Some(obj.content_type.clone()),
            size: Some(obj.data.len() as u64),
        })
    }

    async fn open_reader(&self, key: &str) -> Result<ObjectReader, StorageError> {
        let data = self
            .get(key)
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))?;
        Ok(Box::pin(Cursor::new(data)))
    }

    async fn open_writer(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<Box<dyn ObjectWriter>, StorageError> {
        Ok(Box::new(EphemeralWriter {
            objects: Arc::clone(&self.objects),
            key: key.to_string(),
            content_type: content_type.unwrap_or(DEFAULT_CONTENT_TYPE).to_string(),
            buffer: Vec::new(),
        }))
    }
}

/// Buffers an upload and publishes it into the map on commit
struct EphemeralWriter {
    objects: Arc<DashMap<String, InMemoryObject>>,
    key: String,
    content_type: String,
    buffer: Vec<u8>,
}

impl AsyncWrite for EphemeralWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.buffer).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.buffer).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.buffer).poll_shutdown(cx)
    }
}

#[async_trait]
impl ObjectWriter for EphemeralWriter {
    async fn commit(self: Box<Self>) -> Result<u64, StorageError> {
        let EphemeralWriter {
            objects,
            key,
            content_type,
            buffer,
        } = *self;

        let size = buffer.len() as u64;
        objects.insert(
            key,
            InMemoryObject {
                data: Bytes::from(buffer),
                content_type,
            },
        );
        Ok(size)
    }

    async fn abort(self: Box<Self>) {}
}
