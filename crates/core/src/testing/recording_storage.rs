//! Storage wrapper that counts calls.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::storage::{ObjectReader, StorageBackend, StorageError};

/// Wraps a real backend and records every call, so tests can assert that
/// a path was (or was not) touched.
pub struct RecordingStorage {
    inner: Arc<dyn StorageBackend>,
    gets: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    /// Locations returned by successful puts.
    stored: RwLock<Vec<String>>,
    /// If set, the next put fails with this error.
    next_put_error: RwLock<Option<StorageError>>,
}

impl RecordingStorage {
    pub fn new(inner: Arc<dyn StorageBackend>) -> Self {
        Self {
            inner,
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            stored: RwLock::new(Vec::new()),
            next_put_error: RwLock::new(None),
        }
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub async fn stored_locations(&self) -> Vec<String> {
        self.stored.read().await.clone()
    }

    pub async fn set_next_put_error(&self, error: StorageError) {
        *self.next_put_error.write().await = Some(error);
    }
}

#[async_trait]
impl StorageBackend for RecordingStorage {
    fn name(&self) -> &str {
        "recording"
    }

    async fn put(
        &self,
        reader: ObjectReader,
        suggested_name: &str,
        size: u64,
    ) -> Result<String, StorageError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.next_put_error.write().await.take() {
            return Err(err);
        }
        let location = self.inner.put(reader, suggested_name, size).await?;
        self.stored.write().await.push(location.clone());
        Ok(location)
    }

    async fn get(&self, location: &str) -> Result<ObjectReader, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(location).await
    }

    async fn delete(&self, location: &str) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(location).await
    }

    async fn presigned_url(
        &self,
        location: &str,
        ttl: Duration,
    ) -> Result<Option<String>, StorageError> {
        self.inner.presigned_url(location, ttl).await
    }

    async fn put_file(&self, path: &Path, suggested_name: &str) -> Result<String, StorageError> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        self.put(Box::new(file), suggested_name, size).await
    }
}
