//! Trait definitions for the storage module.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};

use super::error::StorageError;

/// Byte stream returned by [`StorageBackend::get`].
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Durable blob storage addressed by opaque location strings.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Returns the name of this backend.
    fn name(&self) -> &str;

    /// Stores `size` bytes read from `reader` and returns the new location.
    ///
    /// `suggested_name` only influences the readable part of the location;
    /// two puts with the same name never collide. If the stream length
    /// differs from `size` the put fails and no object remains.
    async fn put(
        &self,
        reader: ObjectReader,
        suggested_name: &str,
        size: u64,
    ) -> Result<String, StorageError>;

    /// Opens the object at `location` for reading.
    async fn get(&self, location: &str) -> Result<ObjectReader, StorageError>;

    /// Removes the object at `location`.
    async fn delete(&self, location: &str) -> Result<(), StorageError>;

    /// Returns a time-limited URL for downloading the object directly, if
    /// the backend supports it.
    async fn presigned_url(
        &self,
        location: &str,
        ttl: Duration,
    ) -> Result<Option<String>, StorageError>;

    /// Stores a local file, taking the size from its metadata.
    async fn put_file(&self, path: &Path, suggested_name: &str) -> Result<String, StorageError> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        self.put(Box::new(file), suggested_name, size).await
    }

    /// Copies the object at `location` into a local file and returns the
    /// number of bytes written. A partially written file is removed.
    async fn download_to(&self, location: &str, path: &Path) -> Result<u64, StorageError> {
        let mut reader = self.get(location).await?;

        let copied = async {
            let mut file = tokio::fs::File::create(path).await?;
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            Ok::<_, std::io::Error>(written)
        }
        .await;

        match copied {
            Ok(written) => Ok(written),
            Err(e) => {
                let _ = tokio::fs::remove_file(path).await;
                Err(e.into())
            }
        }
    }
}
