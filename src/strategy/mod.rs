//! Pluggable container-wide algorithms.
//!
//! Each strategy owns a handle to the backing store and implements one
//! cross-cutting operation (enumerate, clear, count, value-search). The map
//! facades pick defaults but accept any implementation at construction.

pub mod clear;
pub mod contains_value;
pub mod get_all;

use crate::blob::{Blob, BlobMetadata};
use crate::error::Result;
use crate::store::{BlobStore, ListOptions};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

pub use clear::FanoutClearContainerStrategy;
pub use contains_value::DigestContainsValueStrategy;
pub use get_all::RetryOnAbsentGetBlobsStrategy;

/// Fetch every blob in a container, payloads included.
#[async_trait]
pub trait GetBlobsStrategy: Send + Sync {
    async fn execute(&self, container: &str) -> Result<Vec<Blob>>;
}

/// Fetch the metadata of every blob in a container.
#[async_trait]
pub trait ListBlobMetadataStrategy: Send + Sync {
    async fn execute(&self, container: &str) -> Result<Vec<BlobMetadata>>;
}

/// Decide whether any blob's content equals the candidate bytes.
#[async_trait]
pub trait ContainsValueStrategy: Send + Sync {
    async fn execute(&self, container: &str, value: &Bytes) -> Result<bool>;
}

/// Remove every blob from a container.
#[async_trait]
pub trait ClearContainerStrategy: Send + Sync {
    async fn execute(&self, container: &str) -> Result<()>;
}

/// Count the live blobs in a container.
#[async_trait]
pub trait CountBlobsStrategy: Send + Sync {
    async fn execute(&self, container: &str) -> Result<usize>;
}

/// Metadata-listing strategy backed by a single `list_blobs` call.
pub struct ListContainerMetadataStrategy {
    store: Arc<dyn BlobStore>,
}

impl ListContainerMetadataStrategy {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ListBlobMetadataStrategy for ListContainerMetadataStrategy {
    async fn execute(&self, container: &str) -> Result<Vec<BlobMetadata>> {
        self.store
            .list_blobs(container, &ListOptions::default())
            .await
    }
}

/// Count strategy that takes the length of a metadata listing. No
/// client-side caching; every call hits the store.
pub struct MetadataCountStrategy {
    store: Arc<dyn BlobStore>,
}

impl MetadataCountStrategy {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CountBlobsStrategy for MetadataCountStrategy {
    async fn execute(&self, container: &str) -> Result<usize> {
        let listing = self
            .store
            .list_blobs(container, &ListOptions::default())
            .await?;
        Ok(listing.len())
    }
}
