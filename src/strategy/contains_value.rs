use crate::blob::compute_etag;
use crate::error::Result;
use crate::store::{BlobStore, ListOptions};
use crate::strategy::ContainsValueStrategy;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Value search by content digest.
///
/// Equality is by content, not key: the candidate's MD5 is compared against
/// every stored etag, stopping at the first match. Linear in container
/// size; no index is maintained.
pub struct DigestContainsValueStrategy {
    store: Arc<dyn BlobStore>,
}

impl DigestContainsValueStrategy {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ContainsValueStrategy for DigestContainsValueStrategy {
    async fn execute(&self, container: &str, value: &Bytes) -> Result<bool> {
        let candidate_etag = compute_etag(value);
        let listing = self
            .store
            .list_blobs(container, &ListOptions::default())
            .await?;
        Ok(listing
            .iter()
            .any(|metadata| metadata.etag == candidate_etag))
    }
}
