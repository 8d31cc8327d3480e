use crate::blob::{Blob, BlobMetadata};
use crate::config::MapConfig;
use crate::error::{CirrusError, Result};
use crate::map::BaseBlobMap;
use crate::store::{BlobStore, GetOptions};
use bytes::Bytes;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

/// Whole-blob map view over a container.
///
/// `put` and `remove` follow the map contract of answering the prior
/// value, which costs one extra fetch per call. Uploads are not retried
/// here; retry policy lives in the strategies.
pub struct BlobMap {
    base: BaseBlobMap,
}

impl BlobMap {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>, config: MapConfig) -> Self {
        Self {
            base: BaseBlobMap::new(store, container, config),
        }
    }

    pub fn from_base(base: BaseBlobMap) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &BaseBlobMap {
        &self.base
    }

    pub fn container(&self) -> &str {
        self.base.container()
    }

    pub async fn size(&self) -> Result<usize> {
        self.base.size().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        self.base.is_empty().await
    }

    pub async fn key_set(&self) -> Result<HashSet<String>> {
        self.base.key_set().await
    }

    pub async fn contains_key(&self, key: &str) -> Result<bool> {
        self.base.contains_key(key).await
    }

    pub async fn contains_value(&self, value: &Bytes) -> Result<bool> {
        self.base.contains_value(value).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.base.clear().await
    }

    pub async fn list(&self) -> Result<Vec<BlobMetadata>> {
        self.base.list().await
    }

    /// Fetch one blob; `None` when the key does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<Blob>> {
        let container = self.base.container().to_string();
        let store = Arc::clone(self.base.store());
        self.base
            .bounded("get_blob", key, async move {
                store.get_blob(&container, key, &GetOptions::default()).await
            })
            .await
    }

    /// Store a blob under `key`, answering the prior value.
    ///
    /// An upload failure is fatal for this key; nothing at this layer
    /// retries it.
    pub async fn put(&self, key: &str, blob: Blob) -> Result<Option<Blob>> {
        let prior = self.get(key).await?;

        let mut blob = blob;
        blob.metadata.key = key.to_string();
        let container = self.base.container().to_string();
        let store = Arc::clone(self.base.store());
        self.base
            .bounded("put_blob", key, async move {
                store.put_blob(&container, blob).await
            })
            .await?;
        Ok(prior)
    }

    /// Upload every entry concurrently and drain all results.
    ///
    /// On failure a single partial-failure error is raised carrying the
    /// first cause; writes that already completed are not rolled back.
    pub async fn put_all<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Blob)>,
    {
        let container = self.base.container().to_string();
        let timeout = self.base.config().request_timeout();
        let timeout_ms = self.base.config().request_timeout_ms;

        let handles: Vec<_> = entries
            .into_iter()
            .map(|(key, mut blob)| {
                blob.metadata.key = key.clone();
                let store = Arc::clone(self.base.store());
                let container = container.clone();
                tokio::spawn(async move {
                    let outcome =
                        tokio::time::timeout(timeout, store.put_blob(&container, blob)).await;
                    match outcome {
                        Ok(result) => result.map(|_| ()),
                        Err(_) => Err(CirrusError::Timeout {
                            container,
                            key,
                            operation: "put_blob",
                            elapsed_ms: timeout_ms,
                        }),
                    }
                })
            })
            .collect();

        let mut failed = 0usize;
        let mut first_cause: Option<CirrusError> = None;
        for joined in join_all(handles).await {
            if let Err(error) = joined? {
                tracing::warn!("Upload failed during put_all on {}: {}", container, error);
                failed += 1;
                first_cause.get_or_insert(error);
            }
        }

        match first_cause {
            None => Ok(()),
            Some(cause) => Err(CirrusError::Partial {
                operation: "put_all",
                container,
                failed,
                source: Box::new(cause),
            }),
        }
    }

    /// Delete `key`, answering the prior value. Absence is not an error.
    pub async fn remove(&self, key: &str) -> Result<Option<Blob>> {
        let prior = self.get(key).await?;

        let container = self.base.container().to_string();
        let store = Arc::clone(self.base.store());
        self.base
            .bounded("remove_blob", key, async move {
                store.remove_blob(&container, key).await
            })
            .await?;
        Ok(prior)
    }

    /// Every blob in the container, via the fan-out fetch strategy.
    pub async fn values(&self) -> Result<Vec<Blob>> {
        self.base
            .get_blobs_strategy()
            .execute(self.base.container())
            .await
    }

    /// Every (key, blob) pair in the container.
    pub async fn entries(&self) -> Result<Vec<(String, Blob)>> {
        let blobs = self.values().await?;
        Ok(blobs
            .into_iter()
            .map(|blob| (blob.key().to_string(), blob))
            .collect())
    }
}
