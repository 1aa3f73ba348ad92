//! S3-compatible storage backend
//!
//! Works against AWS S3 and anything speaking its API (MinIO, the Google
//! Cloud Storage XML interoperability endpoint, ...). Reads stream the
//! GetObject body straight through; uploads are spooled to a temporary file
//! and sent with a single PutObject on commit, since PutObject needs the
//! length up front.

use super::spool::Spool;
use super::traits::*;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use tracing::debug;

/// Connection options for an S3-compatible endpoint
#[derive(Debug, Clone, Default)]
pub struct S3Options {
    /// Custom endpoint, e.g. `http://localhost:9000` for MinIO
    pub endpoint_url: Option<String>,
    pub region: Option<String>,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`
    pub force_path_style: bool,
}

/// S3 storage backend bound to one bucket
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the default AWS credential chain plus `options`
    pub async fn connect(bucket: impl Into<String>, options: &S3Options) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &options.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &options.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;

        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(options.force_path_style)
            .build();

        Self::new(Client::from_conf(config), bucket)
    }
}

fn backend_error(err: &impl std::error::Error) -> StorageError {
    StorageError::Backend(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl ObjectBackend for S3Storage {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn probe(&self) -> Result<(), StorageError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::BucketUnavailable(format!(
                    "{}: {}",
                    self.bucket,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }

    async fn metadata(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_not_found()) {
                    StorageError::ObjectNotFound(key.to_string())
                } else {
                    backend_error(&e)
                }
            })?;

        Ok(ObjectMetadata {
            content_type: output.content_type().map(String::from),
            size: output.content_length().and_then(|n| u64::try_from(n).ok()),
        })
    }

    async fn open_reader(&self, key: &str) -> Result<ObjectReader, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::ObjectNotFound(key.to_string())
                } else {
                    backend_error(&e)
                }
            })?;

        Ok(Box::pin(output.body.into_async_read()))
    }

    async fn open_writer(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<Box<dyn ObjectWriter>, StorageError> {
        Ok(Box::new(S3Writer {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            key: key.to_string(),
            content_type: content_type.map(String::from),
            spool: Spool::new().await?,
        }))
    }
}

/// Spools an upload locally and sends it as one PutObject on commit
struct S3Writer {
    client: Client,
    bucket: String,
    key: String,
    content_type: Option<String>,
    spool: Spool,
}

impl AsyncWrite for S3Writer {
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
impl ObjectWriter for S3Writer {
    async fn commit(self: Box<Self>) -> Result<u64, StorageError> {
        let S3Writer {
            client,
            bucket,
            key,
            content_type,
            spool,
        } = *self;

        // The temp file is removed when `temp` drops, whether or not the put succeeds.
        let (temp, size) = spool.finish().await?;
        let body = ByteStream::from_path(&temp)
            .await
            .map_err(|e| backend_error(&e))?;

        client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .set_content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| backend_error(&e))?;

        Ok(size)
    }

    async fn abort(self: Box<Self>) {
        let S3Writer { key, spool, .. } = *self;
        if let Err(e) = spool.discard().await {
            debug!(key = %key, error = %e, "failed to remove spooled upload");
        }
    }
}
