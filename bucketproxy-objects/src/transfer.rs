//! Streaming byte transfer between HTTP bodies and storage streams
//!
//! All paths move data through a buffer of [`TRANSFER_BUFFER_SIZE`] bytes, so
//! memory per request does not grow with object size.

use std::io;

use axum::body::Body;
use futures::{stream, StreamExt, TryStreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::io::{ReaderStream, StreamReader};

/// Size of the intermediate copy buffer
pub const TRANSFER_BUFFER_SIZE: usize = 64 * 1024;

/// A copy that stopped early
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("read failed after {transferred} bytes: {source}")]
    Read {
        transferred: u64,
        #[source]
        source: io::Error,
    },

    #[error("write failed after {transferred} bytes: {source}")]
    Write {
        transferred: u64,
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    /// Bytes fully written to the destination before the failure
    pub fn transferred(&self) -> u64 {
        match self {
            Self::Read { transferred, .. } | Self::Write { transferred, .. } => *transferred,
        }
    }
}

/// Copy everything from `source` into `destination`, then flush it.
///
/// Returns the number of bytes copied. The first error from either side ends
/// the copy; nothing is retried.
pub async fn copy<R, W>(source: &mut R, destination: &mut W) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; TRANSFER_BUFFER_SIZE];
    let mut transferred = 0u64;

    loop {
        let n = source.read(&mut buf).await.map_err(|source| TransferError::Read {
            transferred,
            source,
        })?;
        if n == 0 {
            break;
        }

        destination
            .write_all(&buf[..n])
            .await
            .map_err(|source| TransferError::Write {
                transferred,
                source,
            })?;
        transferred += n as u64;
    }

    destination
        .flush()
        .await
        .map_err(|source| TransferError::Write {
            transferred,
            source,
        })?;

    Ok(transferred)
}

/// Adapt an HTTP request body into a byte reader
pub fn request_reader(body: Body) -> impl AsyncRead + Send + Unpin {
    StreamReader::new(body.into_data_stream().map_err(io::Error::other))
}

/// Turn an object reader into a streaming response body.
///
/// The first chunk is read before returning so that an object which cannot be
/// read at all is reported as an error instead of an empty 200. Failures after
/// that point surface as a body error, which aborts the response mid-stream:
/// the status line has already been sent and cannot be changed.
pub async fn response_body<R>(reader: R) -> io::Result<Body>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut chunks = ReaderStream::with_capacity(reader, TRANSFER_BUFFER_SIZE);

    match chunks.next().await {
        None => Ok(Body::empty()),
        Some(Err(e)) => Err(e),
        Some(Ok(first)) => {
            let rest = stream::once(async move { Ok::<_, io::Error>(first) }).chain(chunks);
            Ok(Body::from_stream(rest))
        }
    }
}
