//! S3-compatible object storage backend.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode, Url};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::config::ObjectStorageConfig;
use super::error::StorageError;
use super::location::generate_location;
use super::sigv4::{encode_path, sha256_hex, Signer};
use super::traits::{ObjectReader, StorageBackend};

/// Objects in a bucket of an S3-compatible service, reached over HTTP with
/// SigV4-signed requests.
///
/// Uploads are buffered in memory so the size can be checked and the
/// body hashed before anything is sent.
pub struct ObjectStorage {
    client: Client,
    config: ObjectStorageConfig,
    signer: Signer,
    endpoint: Url,
}

impl ObjectStorage {
    pub fn new(config: ObjectStorageConfig) -> Result<Self, StorageError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| StorageError::Config(format!("invalid endpoint '{}': {}", config.endpoint, e)))?;
        if endpoint.host_str().is_none() {
            return Err(StorageError::Config(format!(
                "endpoint '{}' has no host",
                config.endpoint
            )));
        }
        if config.bucket.is_empty() {
            return Err(StorageError::Config("bucket must not be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| StorageError::Config(format!("failed to build HTTP client: {}", e)))?;

        let signer = Signer {
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            region: config.region.clone(),
        };

        Ok(Self {
            client,
            config,
            signer,
            endpoint,
        })
    }

    /// Host header value, including a non-default port.
    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        let host = if self.config.path_style {
            host.to_string()
        } else {
            format!("{}.{}", self.config.bucket, host)
        };
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        }
    }

    /// Path component of the request URL for an object key.
    fn canonical_uri(&self, key: &str) -> String {
        let key = encode_path(key);
        if self.config.path_style {
            format!("/{}/{}", urlencoding::encode(&self.config.bucket), key)
        } else {
            format!("/{}", key)
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}://{}{}",
            self.endpoint.scheme(),
            self.host(),
            self.canonical_uri(key)
        )
    }

    fn check_location(location: &str) -> Result<(), StorageError> {
        if location.is_empty() {
            return Err(StorageError::InvalidLocation("empty location".to_string()));
        }
        if location.starts_with('/') || location.split('/').any(|s| s == "..") {
            return Err(StorageError::AccessDenied(location.to_string()));
        }
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        key: &str,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, StorageError> {
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let payload_hash = sha256_hex(body.as_deref().unwrap_or_default());

        let mut headers = vec![
            ("host".to_string(), self.host()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date),
        ];
        if let Some(body) = &body {
            let md5 = md5::compute(body);
            headers.push((
                "content-md5".to_string(),
                base64::engine::general_purpose::STANDARD.encode(md5.0),
            ));
        }

        let authorization = self.signer.authorization(
            method.as_str(),
            &self.canonical_uri(key),
            &[],
            &headers,
            &payload_hash,
            now,
        )?;

        let mut request = self
            .client
            .request(method.clone(), self.object_url(key))
            .header("authorization", authorization);
        for (name, value) in headers.iter().filter(|(name, _)| name != "host") {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Remote(format!("{} {}: {}", method, key, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        match status {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(key.to_string())),
            StatusCode::FORBIDDEN => Err(StorageError::AccessDenied(key.to_string())),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(StorageError::Remote(format!(
                    "{} {} returned {}: {}",
                    method, key, status, body
                )))
            }
        }
    }

    /// Builds a presigned GET URL valid for `ttl` from `now`.
    pub fn presign_at(
        &self,
        location: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        Self::check_location(location)?;
        let query = self.signer.presign_query(
            &self.host(),
            &self.canonical_uri(location),
            ttl.as_secs().max(1),
            now,
        )?;
        Ok(format!("{}?{}", self.object_url(location), query))
    }
}

#[async_trait]
impl StorageBackend for ObjectStorage {
    fn name(&self) -> &str {
        "object"
    }

    async fn put(
        &self,
        reader: ObjectReader,
        suggested_name: &str,
        size: u64,
    ) -> Result<String, StorageError> {
        let mut body = Vec::with_capacity(size.min(64 * 1024 * 1024) as usize);
        // Read one byte past the declared size so an oversized stream is
        // detected without buffering all of it.
        reader.take(size.saturating_add(1)).read_to_end(&mut body).await?;
        let actual = body.len() as u64;
        if actual != size {
            return Err(StorageError::SizeMismatch {
                expected: size,
                actual,
            });
        }

        let location = generate_location(
            self.config.key_prefix.as_deref(),
            suggested_name,
            Utc::now(),
        );
        self.send(Method::PUT, &location, Some(body)).await?;
        debug!("Uploaded {} bytes to {}", size, location);
        Ok(location)
    }

    async fn get(&self, location: &str) -> Result<ObjectReader, StorageError> {
        Self::check_location(location)?;
        let response = self.send(Method::GET, location, None).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::Remote(format!("reading {}: {}", location, e)))?;
        Ok(Box::new(std::io::Cursor::new(bytes)))
    }

    async fn delete(&self, location: &str) -> Result<(), StorageError> {
        Self::check_location(location)?;
        // S3 reports success for deletes of missing keys.
        self.send(Method::HEAD, location, None).await?;
        self.send(Method::DELETE, location, None).await?;
        Ok(())
    }

    async fn presigned_url(
        &self,
        location: &str,
        ttl: Duration,
    ) -> Result<Option<String>, StorageError> {
        self.presign_at(location, ttl, Utc::now()).map(Some)
    }
}
