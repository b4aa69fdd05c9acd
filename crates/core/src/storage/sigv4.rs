//! AWS Signature Version 4 for S3-compatible object stores.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::error::StorageError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Payload hash used when the body is not signed (presigned URLs).
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Credentials and region used to sign requests.
#[derive(Debug, Clone)]
pub struct Signer {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Percent-encodes each path segment, keeping the separators.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn hmac(key: &[u8], data: &str) -> Result<Vec<u8>, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::Config(format!("invalid signing key: {}", e)))?;
    mac.update(data.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn canonical_query(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| {
            (
                urlencoding::encode(k).into_owned(),
                urlencoding::encode(v).into_owned(),
            )
        })
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

impl Signer {
    fn scope(&self, now: DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            now.format("%Y%m%d"),
            self.region,
            SERVICE
        )
    }

    fn signature(&self, now: DateTime<Utc>, canonical_request: &str) -> Result<String, StorageError> {
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            now.format("%Y%m%dT%H%M%SZ"),
            self.scope(now),
            sha256_hex(canonical_request.as_bytes())
        );

        let date_key = hmac(
            format!("AWS4{}", self.secret_key).as_bytes(),
            &now.format("%Y%m%d").to_string(),
        )?;
        let region_key = hmac(&date_key, &self.region)?;
        let service_key = hmac(&region_key, SERVICE)?;
        let signing_key = hmac(&service_key, "aws4_request")?;
        Ok(hex::encode(hmac(&signing_key, &string_to_sign)?))
    }

    /// Computes the `Authorization` header for a request.
    ///
    /// `headers` must contain every header to sign with lower-case names,
    /// including `host`, `x-amz-date` and `x-amz-content-sha256`.
    pub fn authorization(
        &self,
        method: &str,
        canonical_uri: &str,
        query: &[(String, String)],
        headers: &[(String, String)],
        payload_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let mut headers: Vec<(String, String)> = headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        headers.sort();

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method,
            canonical_uri,
            canonical_query(query),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        Ok(format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM,
            self.access_key,
            self.scope(now),
            signed_headers,
            self.signature(now, &canonical_request)?
        ))
    }

    /// Builds the query string of a presigned GET URL (signature included).
    pub fn presign_query(
        &self,
        host: &str,
        canonical_uri: &str,
        expires_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<String, StorageError> {
        let params = vec![
            ("X-Amz-Algorithm".to_string(), ALGORITHM.to_string()),
            (
                "X-Amz-Credential".to_string(),
                format!("{}/{}", self.access_key, self.scope(now)),
            ),
            (
                "X-Amz-Date".to_string(),
                now.format("%Y%m%dT%H%M%SZ").to_string(),
            ),
            ("X-Amz-Expires".to_string(), expires_secs.to_string()),
            ("X-Amz-SignedHeaders".to_string(), "host".to_string()),
        ];
        let query = canonical_query(&params);

        let canonical_request = format!(
            "GET\n{}\n{}\nhost:{}\n\nhost\n{}",
            canonical_uri, query, host, UNSIGNED_PAYLOAD
        );
        let signature = self.signature(now, &canonical_request)?;
        Ok(format!("{}&X-Amz-Signature={}", query, signature))
    }
}
