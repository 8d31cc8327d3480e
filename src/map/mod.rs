//! Map-shaped facades over a remote container.
//!
//! A caller treats a container as a key-value map; every operation here
//! translates to one or many concurrent store calls coordinated by a
//! strategy. Nothing is cached client-side, so each call observes the
//! store as it is at call time, best-effort under eventual consistency.

pub mod blob_map;
pub mod bytes_map;

use crate::blob::BlobMetadata;
use crate::config::MapConfig;
use crate::error::{CirrusError, Result};
use crate::store::BlobStore;
use crate::strategy::{
    ClearContainerStrategy, ContainsValueStrategy, CountBlobsStrategy, DigestContainsValueStrategy,
    FanoutClearContainerStrategy, GetBlobsStrategy, ListBlobMetadataStrategy,
    ListContainerMetadataStrategy, MetadataCountStrategy, RetryOnAbsentGetBlobsStrategy,
};
use bytes::Bytes;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

/// Shared core of the map views: a store handle, a container name, timing
/// policy, and the strategy set. Strategies default to the stock
/// implementations and can be swapped at construction.
pub struct BaseBlobMap {
    store: Arc<dyn BlobStore>,
    container: String,
    config: MapConfig,
    get_blobs: Arc<dyn GetBlobsStrategy>,
    list_metadata: Arc<dyn ListBlobMetadataStrategy>,
    contains_value: Arc<dyn ContainsValueStrategy>,
    clear_container: Arc<dyn ClearContainerStrategy>,
    count_blobs: Arc<dyn CountBlobsStrategy>,
}

impl BaseBlobMap {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>, config: MapConfig) -> Self {
        Self {
            get_blobs: Arc::new(RetryOnAbsentGetBlobsStrategy::new(
                Arc::clone(&store),
                config.clone(),
            )),
            list_metadata: Arc::new(ListContainerMetadataStrategy::new(Arc::clone(&store))),
            contains_value: Arc::new(DigestContainsValueStrategy::new(Arc::clone(&store))),
            clear_container: Arc::new(FanoutClearContainerStrategy::new(
                Arc::clone(&store),
                config.clone(),
            )),
            count_blobs: Arc::new(MetadataCountStrategy::new(Arc::clone(&store))),
            store,
            container: container.into(),
            config,
        }
    }

    pub fn with_get_blobs_strategy(mut self, strategy: Arc<dyn GetBlobsStrategy>) -> Self {
        self.get_blobs = strategy;
        self
    }

    pub fn with_list_metadata_strategy(mut self, strategy: Arc<dyn ListBlobMetadataStrategy>) -> Self {
        self.list_metadata = strategy;
        self
    }

    pub fn with_contains_value_strategy(mut self, strategy: Arc<dyn ContainsValueStrategy>) -> Self {
        self.contains_value = strategy;
        self
    }

    pub fn with_clear_strategy(mut self, strategy: Arc<dyn ClearContainerStrategy>) -> Self {
        self.clear_container = strategy;
        self
    }

    pub fn with_count_strategy(mut self, strategy: Arc<dyn CountBlobsStrategy>) -> Self {
        self.count_blobs = strategy;
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub(crate) fn get_blobs_strategy(&self) -> &Arc<dyn GetBlobsStrategy> {
        &self.get_blobs
    }

    /// Bound a single store call by the configured request timeout.
    pub(crate) async fn bounded<T, F>(
        &self,
        operation: &'static str,
        key: &str,
        call: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.config.request_timeout(), call)
            .await
            .map_err(|_| CirrusError::Timeout {
                container: self.container.clone(),
                key: key.to_string(),
                operation,
                elapsed_ms: self.config.request_timeout_ms,
            })?
    }

    /// Count of live keys, straight from the store.
    pub async fn size(&self) -> Result<usize> {
        self.count_blobs.execute(&self.container).await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.size().await? == 0)
    }

    /// The current key names, unordered and unique.
    pub async fn key_set(&self) -> Result<HashSet<String>> {
        let listing = self.list_metadata.execute(&self.container).await?;
        Ok(listing.into_iter().map(|metadata| metadata.key).collect())
    }

    /// Metadata-only probe. An unreadable key is absence, not an error.
    pub async fn contains_key(&self, key: &str) -> Result<bool> {
        let probed = self
            .bounded("blob_metadata", key, self.store.blob_metadata(&self.container, key))
            .await?;
        Ok(probed.is_some())
    }

    /// Whether any blob's content equals `value`. Equality is by digest.
    pub async fn contains_value(&self, value: &Bytes) -> Result<bool> {
        self.contains_value.execute(&self.container, value).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.clear_container.execute(&self.container).await
    }

    /// Full metadata listing of the container.
    pub async fn list(&self) -> Result<Vec<BlobMetadata>> {
        self.list_metadata.execute(&self.container).await
    }
}
