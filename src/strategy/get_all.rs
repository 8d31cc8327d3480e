use crate::blob::Blob;
use crate::config::MapConfig;
use crate::error::{CirrusError, Result};
use crate::store::{BlobStore, GetOptions, ListOptions};
use crate::strategy::GetBlobsStrategy;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

/// Fan-out fetch of a whole container that tolerates listed-but-unreadable
/// keys.
///
/// Object stores commonly exhibit list-then-get inconsistency shortly after
/// writes. Rather than fail an entire enumeration because one key has not
/// propagated yet, each get is retried a bounded number of times with a
/// short pause; a key still absent after the budget is dropped from the
/// result rather than raised as an error. Timeouts and store failures are
/// not absorbed.
pub struct RetryOnAbsentGetBlobsStrategy {
    store: Arc<dyn BlobStore>,
    config: MapConfig,
}

impl RetryOnAbsentGetBlobsStrategy {
    pub fn new(store: Arc<dyn BlobStore>, config: MapConfig) -> Self {
        Self { store, config }
    }

    async fn get_with_retries(
        store: Arc<dyn BlobStore>,
        config: MapConfig,
        container: String,
        key: String,
    ) -> Result<Option<Blob>> {
        let attempts = config.max_not_found_retries.max(1);
        let options = GetOptions::default();
        for attempt in 1..=attempts {
            let fetched = tokio::time::timeout(
                config.request_timeout(),
                store.get_blob(&container, &key, &options),
            )
            .await
            .map_err(|_| CirrusError::Timeout {
                container: container.clone(),
                key: key.clone(),
                operation: "get_blob",
                elapsed_ms: config.request_timeout_ms,
            })??;

            match fetched {
                Some(mut blob) => {
                    // A get-by-key response does not always embed its own
                    // key; stamp it from the listing.
                    blob.metadata.key = key.clone();
                    return Ok(Some(blob));
                }
                None if attempt < attempts => {
                    tracing::debug!(
                        "Key {}/{} listed but not readable yet, retry {}/{}",
                        container,
                        key,
                        attempt,
                        attempts
                    );
                    tokio::time::sleep(config.request_retry()).await;
                }
                None => return Ok(None),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl GetBlobsStrategy for RetryOnAbsentGetBlobsStrategy {
    async fn execute(&self, container: &str) -> Result<Vec<Blob>> {
        let listing = self
            .store
            .list_blobs(container, &ListOptions::default())
            .await?;

        let handles: Vec<_> = listing
            .into_iter()
            .map(|metadata| {
                let store = Arc::clone(&self.store);
                let config = self.config.clone();
                let container = container.to_string();
                tokio::spawn(Self::get_with_retries(
                    store,
                    config,
                    container,
                    metadata.key,
                ))
            })
            .collect();

        let mut blobs = Vec::new();
        for joined in join_all(handles).await {
            match joined? {
                Ok(Some(blob)) => blobs.push(blob),
                Ok(None) => {
                    // Retry budget exhausted; degrade gracefully instead of
                    // failing the whole enumeration.
                    tracing::debug!("Dropping unreadable key from {} enumeration", container);
                }
                Err(error) => return Err(error),
            }
        }
        Ok(blobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use bytes::Bytes;

    fn fast_config() -> MapConfig {
        MapConfig {
            request_timeout_ms: 1_000,
            request_retry_ms: 1,
            max_not_found_retries: 3,
        }
    }

    #[tokio::test]
    async fn test_fetches_all_blobs() {
        let store = Arc::new(MemoryBlobStore::new());
        store.create_container("c1").await.unwrap();
        store.put_blob("c1", Blob::new("a", "x")).await.unwrap();
        store.put_blob("c1", Blob::new("b", "y")).await.unwrap();

        let strategy = RetryOnAbsentGetBlobsStrategy::new(store, fast_config());
        let mut blobs = strategy.execute("c1").await.unwrap();
        blobs.sort_by(|a, b| a.key().cmp(b.key()));

        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].key(), "a");
        assert_eq!(blobs[0].payload, Bytes::from_static(b"x"));
        assert_eq!(blobs[1].key(), "b");
    }

    #[tokio::test]
    async fn test_retries_through_transient_absence() {
        let store = Arc::new(MemoryBlobStore::new());
        store.create_container("c1").await.unwrap();
        store.put_blob("c1", Blob::new("slow", "v")).await.unwrap();
        // Absent for two reads, visible on the third attempt.
        store.fail_next_reads("c1", "slow", 2);

        let strategy = RetryOnAbsentGetBlobsStrategy::new(store, fast_config());
        let blobs = strategy.execute("c1").await.unwrap();
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].key(), "slow");
    }

    #[tokio::test]
    async fn test_drops_key_after_retry_budget() {
        let store = Arc::new(MemoryBlobStore::new());
        store.create_container("c1").await.unwrap();
        store.put_blob("c1", Blob::new("ok", "v")).await.unwrap();
        store.put_blob("c1", Blob::new("stale", "w")).await.unwrap();
        // Unreadable for more attempts than the budget allows.
        store.fail_next_reads("c1", "stale", 10);

        let strategy = RetryOnAbsentGetBlobsStrategy::new(store, fast_config());
        let blobs = strategy.execute("c1").await.unwrap();
        let keys: Vec<&str> = blobs.iter().map(|b| b.key()).collect();
        assert_eq!(keys, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_missing_container_propagates() {
        let store = Arc::new(MemoryBlobStore::new());
        let strategy = RetryOnAbsentGetBlobsStrategy::new(store, fast_config());
        let err = strategy.execute("absent").await.unwrap_err();
        assert!(matches!(err, CirrusError::ContainerNotFound(_)));
    }
}
