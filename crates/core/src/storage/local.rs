//! Local filesystem storage backend.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::error::StorageError;
use super::location::generate_location;
use super::traits::{ObjectReader, StorageBackend};

/// Fresh locations tried before `put` gives up.
const CREATE_ATTEMPTS: usize = 5;

/// Stores objects as files under a root directory.
///
/// Locations are relative paths below the root. Any location that would
/// resolve outside the root (through `..`, an absolute path, or a symlink)
/// is rejected with [`StorageError::AccessDenied`].
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    key_prefix: Option<String>,
}

impl LocalStorage {
    /// Creates the root directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        Ok(Self {
            root,
            key_prefix: None,
        })
    }

    /// Places new objects under `prefix/` inside the root.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.key_prefix = (!prefix.trim_matches('/').is_empty()).then_some(prefix);
        self
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a location to a path under the root without touching the disk.
    fn resolve(&self, location: &str) -> Result<PathBuf, StorageError> {
        if location.is_empty() {
            return Err(StorageError::InvalidLocation("empty location".to_string()));
        }
        let relative = Path::new(location);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(StorageError::AccessDenied(location.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Creates the file for a fresh location, never reusing an existing one.
    async fn create_object(
        &self,
        suggested_name: &str,
    ) -> Result<(String, PathBuf, tokio::fs::File), StorageError> {
        for _ in 0..CREATE_ATTEMPTS {
            let location =
                generate_location(self.key_prefix.as_deref(), suggested_name, Utc::now());
            if let Some((path, file)) = self.open_new(&location).await? {
                return Ok((location, path, file));
            }
            debug!("Location {} already taken, generating another", location);
        }
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("no free location for {:?}", suggested_name),
        )))
    }

    /// Opens `location` for writing only if nothing exists there yet.
    /// `None` when the location is taken.
    async fn open_new(
        &self,
        location: &str,
    ) -> Result<Option<(PathBuf, tokio::fs::File)>, StorageError> {
        let path = self.resolve(location)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => Ok(Some((path, file))),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves an existing object and confirms it really lives under the root.
    async fn resolve_existing(&self, location: &str) -> Result<PathBuf, StorageError> {
        let path = self.resolve(location)?;
        let canonical = match tokio::fs::canonicalize(&path).await {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(location.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if !canonical.starts_with(&self.root) {
            return Err(StorageError::AccessDenied(location.to_string()));
        }
        if !canonical.is_file() {
            return Err(StorageError::NotFound(location.to_string()));
        }
        Ok(canonical)
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn name(&self) -> &str {
        "local"
    }

    async fn put(
        &self,
        mut reader: ObjectReader,
        suggested_name: &str,
        size: u64,
    ) -> Result<String, StorageError> {
        let (location, path, mut file) = self.create_object(suggested_name).await?;

        let written = async {
            let n = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            Ok::<_, std::io::Error>(n)
        }
        .await;

        drop(file);
        match written {
            Ok(actual) if actual == size => {
                debug!("Stored {} bytes at {}", actual, location);
                Ok(location)
            }
            Ok(actual) => {
                let _ = tokio::fs::remove_file(&path).await;
                Err(StorageError::SizeMismatch {
                    expected: size,
                    actual,
                })
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                Err(e.into())
            }
        }
    }

    async fn get(&self, location: &str) -> Result<ObjectReader, StorageError> {
        let path = self.resolve_existing(location).await?;
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::new(file))
    }

    async fn delete(&self, location: &str) -> Result<(), StorageError> {
        let path = self.resolve_existing(location).await?;
        tokio::fs::remove_file(path).await?;
        Ok(())
    }

    async fn presigned_url(
        &self,
        _location: &str,
        _ttl: Duration,
    ) -> Result<Option<String>, StorageError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn reader(bytes: &'static [u8]) -> ObjectReader {
        Box::new(bytes)
    }

    async fn read_all(mut reader: ObjectReader) -> Vec<u8> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        buf
    }

    fn count_files(dir: &Path) -> usize {
        let mut count = 0;
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                count += count_files(&path);
            } else {
                count += 1;
            }
        }
        count
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();

        let loc = storage.put(reader(b"hello world"), "greeting.txt", 11).await.unwrap();
        assert!(loc.ends_with(".txt"));

        let data = read_all(storage.get(&loc).await.unwrap()).await;
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn test_same_name_distinct_locations() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let a = storage.put(reader(b"a"), "same.bin", 1).await.unwrap();
        let b = storage.put(reader(b"b"), "same.bin", 1).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(read_all(storage.get(&a).await.unwrap()).await, b"a");
        assert_eq!(read_all(storage.get(&b).await.unwrap()).await, b"b");
    }

    #[tokio::test]
    async fn test_existing_object_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let loc = storage.put(reader(b"first"), "taken.bin", 5).await.unwrap();

        assert!(storage.open_new(&loc).await.unwrap().is_none());
        assert_eq!(read_all(storage.get(&loc).await.unwrap()).await, b"first");
        assert_eq!(count_files(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_size_mismatch_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();

        let err = storage.put(reader(b"short"), "x.bin", 100).await.unwrap_err();
        match err {
            StorageError::SizeMismatch { expected, actual } => {
                assert_eq!(expected, 100);
                assert_eq!(actual, 5);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(count_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_key_prefix() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path())
            .unwrap()
            .with_key_prefix("uploads");
        let loc = storage.put(reader(b"x"), "x.bin", 1).await.unwrap();
        assert!(loc.starts_with("uploads/"));
        assert!(storage.root().join(&loc).is_file());
    }

    #[tokio::test]
    async fn test_traversal_denied() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("root")).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        for loc in ["../secret.txt", "/etc/passwd", "a/../../secret.txt"] {
            assert!(
                matches!(storage.get(loc).await, Err(StorageError::AccessDenied(_))),
                "{} should be denied",
                loc
            );
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_denied() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("root")).unwrap();
        std::fs::write(dir.path().join("outside.txt"), b"outside").unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("outside.txt"),
            storage.root().join("link.txt"),
        )
        .unwrap();

        assert!(matches!(
            storage.get("link.txt").await,
            Err(StorageError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_get_and_delete_missing() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        assert!(matches!(
            storage.get("2024/01/01/nothing.bin").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.delete("2024/01/01/nothing.bin").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.get("").await,
            Err(StorageError::InvalidLocation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_object() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let loc = storage.put(reader(b"bye"), "bye.txt", 3).await.unwrap();
        storage.delete(&loc).await.unwrap();
        assert!(matches!(
            storage.get(&loc).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_file_and_download_to() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("store")).unwrap();

        let source = dir.path().join("input.jpeg");
        std::fs::write(&source, b"fake jpeg bytes").unwrap();
        let loc = storage.put_file(&source, "input.jpeg").await.unwrap();

        let dest = dir.path().join("copy.jpeg");
        let written = storage.download_to(&loc, &dest).await.unwrap();
        assert_eq!(written, 15);
        assert_eq!(std::fs::read(&dest).unwrap(), b"fake jpeg bytes");

        let missing = dir.path().join("missing.jpeg");
        assert!(storage.download_to("2020/01/01/x.jpeg", &missing).await.is_err());
        assert!(!missing.exists());
    }

    #[tokio::test]
    async fn test_presigned_url_unsupported() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let url = storage
            .presigned_url("anything", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.is_none());
    }
}
