//! Configuration for the storage module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which storage backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Object,
}

/// Storage section of the configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,
    #[serde(default)]
    pub local: LocalStorageConfig,
    /// Required when `backend = "object"`.
    #[serde(default)]
    pub object: Option<ObjectStorageConfig>,
}

/// Local filesystem storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_local_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub key_prefix: Option<String>,
}

fn default_local_root() -> PathBuf {
    PathBuf::from("./data/storage")
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root: default_local_root(),
            key_prefix: None,
        }
    }
}

/// S3-compatible object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// Service endpoint, e.g. `https://s3.amazonaws.com` or `http://localhost:9000`.
    pub endpoint: String,
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// Address the bucket in the path instead of the host name.
    #[serde(default)]
    pub path_style: bool,
    #[serde(default)]
    pub key_prefix: Option<String>,
    /// Lifetime of presigned download URLs.
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_presign_ttl_secs() -> u64 {
    3600
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            bucket: String::new(),
            region: default_region(),
            access_key: String::new(),
            secret_key: String::new(),
            path_style: false,
            key_prefix: None,
            presign_ttl_secs: default_presign_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
