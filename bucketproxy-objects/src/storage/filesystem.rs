//! Local filesystem storage backend
//!
//! Objects live as regular files under a root directory, one directory per
//! bucket. Keys are split on `/` into path segments; segments that could
//! escape the root (`..`, `.`, empty) are rejected. Uploads are spooled into
//! [`SPOOL_DIR`] under the root and renamed into place on commit, so readers
//! never observe a partially written object. No key can address the spool
//! directory.

use super::spool::Spool;
use super::traits::*;
use async_trait::async_trait;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use tracing::{debug, warn};

/// Directory under the root holding in-progress uploads
pub(crate) const SPOOL_DIR: &str = ".tmp";

/// Filesystem storage backend rooted at a bucket directory
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn spool_dir(&self) -> PathBuf {
        self.root.join(SPOOL_DIR)
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.split('/').next() == Some(SPOOL_DIR) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(StorageError::InvalidKey(key.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

fn not_found_or_io(key: &str, err: io::Error) -> StorageError {
    if err.kind() == ErrorKind::NotFound {
        StorageError::ObjectNotFound(key.to_string())
    } else {
        StorageError::Io(err)
    }
}

#[async_trait]
impl ObjectBackend for FileSystemStorage {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn probe(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let meta = tokio::fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(StorageError::BucketUnavailable(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }

        // Spools left behind by an earlier process were never committed
        let spool_dir = self.spool_dir();
        tokio::fs::create_dir_all(&spool_dir).await?;
        let mut entries = tokio::fs::read_dir(&spool_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                warn!(path = %entry.path().display(), error = %e, "failed to remove stale upload");
            }
        }
        Ok(())
    }

    async fn metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        let path = self.object_path(key)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))?;

        if !meta.is_file() {
            return Err(StorageError::ObjectNotFound(key.to_string()));
        }

        Ok(ObjectMetadata {
            content_type: Some(mime_guess::from_path(&path).first_or_octet_stream().to_string()),
            size: Some(meta.len()),
        })
    }

    async fn open_reader(&self, key: &str) -> Result<ObjectReader, StorageError> {
        let path = self.object_path(key)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(key, e))?;
        Ok(Box::pin(file))
    }

    async fn open_writer(
        &self,
        key: &str,
        _content_type: Option<&str>,
    ) -> Result<Box<dyn ObjectWriter>, StorageError> {
        let target = self.object_path(key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let spool_dir = self.spool_dir();
        tokio::fs::create_dir_all(&spool_dir).await?;
        let spool = Spool::new_in(spool_dir).await?;
        Ok(Box::new(FileSystemWriter { spool, target }))
    }
}

/// Writes into a temp file in the spool directory, renamed over `target` on commit
struct FileSystemWriter {
    spool: Spool,
    target: PathBuf,
}

impl AsyncWrite for FileSystemWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.spool).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.spool).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.spool).poll_shutdown(cx)
    }
}

#[async_trait]
impl ObjectWriter for FileSystemWriter {
    async fn commit(self: Box<Self>) -> Result<u64, StorageError> {
        let FileSystemWriter { spool, target } = *self;
        let (temp, size) = spool.finish().await?;
        tokio::task::spawn_blocking(move || temp.persist(&target))
            .await
            .map_err(|e| StorageError::Io(io::Error::other(e)))?
            .map_err(|e| StorageError::Io(e.error))?;
        Ok(size)
    }

    async fn abort(self: Box<Self>) {
        let FileSystemWriter { spool, target } = *self;
        if let Err(e) = spool.discard().await {
            debug!(path = %target.display(), error = %e, "failed to remove aborted upload");
        }
    }
}
