//! Storage module: durable blob storage for uploaded and converted files.
//!
//! Backends implement [`StorageBackend`]. Callers treat locations as opaque
//! strings handed out by `put`.
//!
//! - [`LocalStorage`] keeps files under a root directory.
//! - [`ObjectStorage`] talks to an S3-compatible bucket and can hand out
//!   presigned download URLs.

mod config;
mod error;
mod local;
mod location;
mod object;
mod sigv4;
mod traits;

use std::sync::Arc;

pub use config::{LocalStorageConfig, ObjectStorageConfig, StorageConfig, StorageKind};
pub use error::StorageError;
pub use local::LocalStorage;
pub use location::generate_location;
pub use object::ObjectStorage;
pub use traits::{ObjectReader, StorageBackend};

/// Builds the backend selected in `config`.
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    match config.backend {
        StorageKind::Local => {
            let mut storage = LocalStorage::new(&config.local.root)?;
            if let Some(prefix) = &config.local.key_prefix {
                storage = storage.with_key_prefix(prefix.clone());
            }
            Ok(Arc::new(storage))
        }
        StorageKind::Object => {
            let object = config.object.clone().ok_or_else(|| {
                StorageError::Config("storage.object section is required".to_string())
            })?;
            Ok(Arc::new(ObjectStorage::new(object)?))
        }
    }
}
