//! Fetch a Cloud Storage object into a local temporary file.
//!
//! # Temp file ownership
//!
//! On success the returned path belongs to the caller, who must delete it.
//! If the copy fails after the file was created, the partial file is removed
//! before the error is returned.

pub mod client;

pub use client::GcsClient;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use common::FunctionError;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Stream of object content chunks.
pub type ObjectStream = BoxStream<'static, Result<Bytes, FunctionError>>;

/// Read access to an object store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Open a read stream for `object` in `bucket`.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged, e.g. when the object or bucket
    /// does not exist or access is denied.
    async fn open_object(&self, bucket: &str, object: &str) -> Result<ObjectStream, FunctionError>;
}

/// Fetch `object` from `bucket` into a new file in the system temp directory.
///
/// If `client` is `None`, a [`GcsClient`] is constructed from the environment
/// for this call.
///
/// # Errors
///
/// Returns an error if the default client cannot be built, the object cannot
/// be opened, or the temp file cannot be created or written.
pub async fn object_to_temp_file(
    client: Option<&dyn ObjectStorage>,
    bucket: &str,
    object: &str,
) -> Result<PathBuf, FunctionError> {
    fetch(client, bucket, object, None).await
}

/// Same as [`object_to_temp_file`], but creates the file inside `dir`.
pub async fn object_to_temp_file_in(
    client: Option<&dyn ObjectStorage>,
    bucket: &str,
    object: &str,
    dir: &Path,
) -> Result<PathBuf, FunctionError> {
    fetch(client, bucket, object, Some(dir)).await
}

async fn fetch(
    client: Option<&dyn ObjectStorage>,
    bucket: &str,
    object: &str,
    dir: Option<&Path>,
) -> Result<PathBuf, FunctionError> {
    let default_client;
    let client: &dyn ObjectStorage = match client {
        Some(c) => c,
        None => {
            default_client = GcsClient::from_env()?;
            &default_client
        }
    };

    let mut stream = client.open_object(bucket, object).await?;

    let mut builder = tempfile::Builder::new();
    builder.prefix("object-");
    let tmp = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };

    // Any early return below drops `tmp`, which deletes the partial file.
    let mut file = tokio::fs::File::from_std(tmp.reopen()?);
    let mut written = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len();
    }
    file.flush().await?;
    drop(file);

    let (_, path) = tmp.keep().map_err(|e| FunctionError::Io(e.error))?;
    debug!(bucket, object, bytes = written, path = %path.display(), "object copied to temp file");
    Ok(path)
}
