use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::converter::ConverterConfig;
use crate::queue::QueueConfig;
use crate::storage::{LocalStorageConfig, StorageConfig, StorageKind};
use crate::worker::WorkerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub converters: ConverterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("transmute.db")
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub storage: SanitizedStorageConfig,
    pub worker: WorkerConfig,
    pub converters: ConverterConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub backend: String,
    pub local: LocalStorageConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<SanitizedObjectStorageConfig>,
}

/// Sanitized object storage config (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedObjectStorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub path_style: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
    pub access_key_configured: bool,
    pub secret_key_configured: bool,
    pub presign_ttl_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            database: config.database.clone(),
            queue: config.queue.clone(),
            storage: SanitizedStorageConfig {
                backend: match config.storage.backend {
                    StorageKind::Local => "local".to_string(),
                    StorageKind::Object => "object".to_string(),
                },
                local: config.storage.local.clone(),
                object: config
                    .storage
                    .object
                    .as_ref()
                    .map(|o| SanitizedObjectStorageConfig {
                        endpoint: o.endpoint.clone(),
                        bucket: o.bucket.clone(),
                        region: o.region.clone(),
                        path_style: o.path_style,
                        key_prefix: o.key_prefix.clone(),
                        access_key_configured: !o.access_key.is_empty(),
                        secret_key_configured: !o.secret_key.is_empty(),
                        presign_ttl_secs: o.presign_ttl_secs,
                    }),
            },
            worker: config.worker.clone(),
            converters: config.converters.clone(),
            logging: config.logging.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueBackend;

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.database.path.to_str().unwrap(), "transmute.db");
        assert_eq!(config.queue.backend, QueueBackend::Sqlite);
        assert_eq!(config.storage.backend, StorageKind::Local);
        assert_eq!(config.worker.concurrency, 2);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
[database]
path = "/data/jobs.db"

[queue]
backend = "sqlite"
poll_interval_ms = 250

[storage]
backend = "object"

[storage.object]
endpoint = "http://localhost:9000"
bucket = "conversions"
access_key = "minio"
secret_key = "minio-secret"
path_style = true

[worker]
concurrency = 4
temp_dir = "/tmp/transmute"
conversion_timeout_secs = 600

[converters]
ffmpeg_path = "/usr/local/bin/ffmpeg"

[logging]
format = "json"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.queue.poll_interval_ms, 250);
        assert_eq!(config.storage.backend, StorageKind::Object);
        let object = config.storage.object.as_ref().unwrap();
        assert_eq!(object.bucket, "conversions");
        assert!(object.path_style);
        assert_eq!(object.region, "us-east-1"); // default
        assert_eq!(config.worker.concurrency, 4);
        assert_eq!(config.worker.conversion_timeout_secs, 600);
        assert_eq!(
            config.converters.ffmpeg_path.to_str().unwrap(),
            "/usr/local/bin/ffmpeg"
        );
        assert_eq!(config.converters.tar_path.to_str().unwrap(), "tar");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_sanitized_config_hides_credentials() {
        let toml = r#"
[storage]
backend = "object"

[storage.object]
endpoint = "https://s3.amazonaws.com"
bucket = "conversions"
access_key = "AKIDEXAMPLE"
secret_key = "very-secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.storage.backend, "object");

        let object = sanitized.storage.object.as_ref().unwrap();
        assert!(object.access_key_configured);
        assert!(object.secret_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("very-secret"));
        assert!(!json.contains("AKIDEXAMPLE"));
    }
}
