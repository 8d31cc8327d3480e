use crate::error::{CirrusError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContainerMetadata {
    pub name: String,
}

impl ContainerMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Descriptor for one stored blob. The etag is always the hex MD5 of the
/// exact payload bytes; stores recompute it on write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlobMetadata {
    pub key: String,
    pub etag: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
    #[serde(default)]
    pub user_metadata: HashMap<String, String>,
}

impl BlobMetadata {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            etag: String::new(),
            size_bytes: 0,
            last_modified: Utc::now(),
            content_type: None,
            user_metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Blob {
    pub metadata: BlobMetadata,
    pub payload: Bytes,
}

impl Blob {
    /// Build a blob from in-memory bytes, computing size and etag eagerly.
    pub fn new(key: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let mut metadata = BlobMetadata::new(key);
        metadata.size_bytes = payload.len() as u64;
        metadata.etag = compute_etag(&payload);
        Self { metadata, payload }
    }

    pub fn key(&self) -> &str {
        &self.metadata.key
    }

    pub fn etag(&self) -> &str {
        &self.metadata.etag
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.metadata.content_type = Some(content_type.into());
        self
    }

    pub fn with_user_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.user_metadata.insert(key.into(), value.into());
        self
    }
}

/// A payload source for the bulk byte-map APIs.
///
/// `materialize` reads the whole source into memory so the etag can be
/// computed before upload. Large files are buffered in full.
#[derive(Debug, Clone)]
pub enum Payload {
    Bytes(Bytes),
    Str(String),
    File(PathBuf),
}

impl Payload {
    pub async fn materialize(self) -> Result<Bytes> {
        match self {
            Payload::Bytes(bytes) => Ok(bytes),
            Payload::Str(s) => Ok(Bytes::from(s)),
            Payload::File(path) => {
                let data = tokio::fs::read(&path).await?;
                Ok(Bytes::from(data))
            }
        }
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Str(s.to_string())
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Str(s)
    }
}

impl From<PathBuf> for Payload {
    fn from(path: PathBuf) -> Self {
        Payload::File(path)
    }
}

/// Compute the hex MD5 etag of a payload.
pub fn compute_etag(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Verify that data matches the expected etag.
pub fn verify_etag(data: &[u8], expected_etag: &str) -> Result<()> {
    let actual_etag = compute_etag(data);
    if actual_etag != expected_etag {
        return Err(CirrusError::EtagMismatch {
            expected: expected_etag.to_string(),
            actual: actual_etag,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_etag_matches_payload() {
        let blob = Blob::new("greeting", "hello world");
        assert_eq!(blob.metadata.size_bytes, 11);
        assert_eq!(blob.etag(), compute_etag(b"hello world"));
        verify_etag(&blob.payload, blob.etag()).unwrap();
    }

    #[test]
    fn test_verify_etag_mismatch() {
        let err = verify_etag(b"abc", &compute_etag(b"def")).unwrap_err();
        assert!(matches!(err, CirrusError::EtagMismatch { .. }));
    }

    #[test]
    fn test_compute_etag_hex_length() {
        // MD5 hex string is 32 chars
        assert_eq!(compute_etag(b"hello").len(), 32);
    }

    #[tokio::test]
    async fn test_payload_materialize_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("payload.bin");
        std::fs::write(&path, b"file contents").unwrap();

        let bytes = Payload::File(path).materialize().await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"file contents"));
    }

    #[tokio::test]
    async fn test_payload_materialize_str() {
        let bytes = Payload::from("xyz").materialize().await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"xyz"));
    }
}
