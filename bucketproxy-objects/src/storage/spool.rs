//! Temporary-file spooling for writers that publish on commit

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tempfile::{Builder, TempPath};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// An upload in progress, backed by a temporary file.
///
/// The file is removed when the spool (or the `TempPath` returned by
/// [`Spool::finish`]) is dropped without being persisted.
pub(crate) struct Spool {
    file: File,
    path: TempPath,
    written: u64,
}

impl Spool {
    /// Spool in the system temp directory
    pub(crate) async fn new() -> io::Result<Self> {
        Self::create(|| Builder::new().prefix(".bucketproxy-").tempfile()).await
    }

    /// Spool inside `dir`, so the result can be renamed into place atomically
    pub(crate) async fn new_in(dir: PathBuf) -> io::Result<Self> {
        Self::create(move || Builder::new().prefix(".upload-").tempfile_in(dir)).await
    }

    async fn create<F>(make: F) -> io::Result<Self>
    where
        F: FnOnce() -> io::Result<tempfile::NamedTempFile> + Send + 'static,
    {
        let named = tokio::task::spawn_blocking(make)
            .await
            .map_err(io::Error::other)??;
        let (file, path) = named.into_parts();
        Ok(Self {
            file: File::from_std(file),
            path,
            written: 0,
        })
    }

    /// Flush and sync the spooled bytes, handing back the file path and size
    pub(crate) async fn finish(mut self) -> io::Result<(TempPath, u64)> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok((self.path, self.written))
    }

    /// Remove the spooled file now rather than on drop
    pub(crate) async fn discard(self) -> io::Result<()> {
        drop(self.file);
        let path = self.path.keep().map_err(|e| e.error)?;
        tokio::fs::remove_file(path).await
    }
}

impl AsyncWrite for Spool {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.file).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = poll {
            self.written += n as u64;
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}
