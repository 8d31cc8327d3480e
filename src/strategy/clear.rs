use crate::config::MapConfig;
use crate::error::{CirrusError, Result};
use crate::store::{BlobStore, ListOptions};
use crate::strategy::ClearContainerStrategy;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

/// Remove every key with one concurrent delete per key.
///
/// All deletes are drained before the outcome is decided; if some failed,
/// a single partial-failure error carries the first cause and the failed
/// count. Completed deletes are not rolled back.
pub struct FanoutClearContainerStrategy {
    store: Arc<dyn BlobStore>,
    config: MapConfig,
}

impl FanoutClearContainerStrategy {
    pub fn new(store: Arc<dyn BlobStore>, config: MapConfig) -> Self {
        Self { store, config }
    }
}

#[async_trait]
impl ClearContainerStrategy for FanoutClearContainerStrategy {
    async fn execute(&self, container: &str) -> Result<()> {
        let listing = self
            .store
            .list_blobs(container, &ListOptions::default())
            .await?;

        let handles: Vec<_> = listing
            .into_iter()
            .map(|metadata| {
                let store = Arc::clone(&self.store);
                let container = container.to_string();
                let timeout = self.config.request_timeout();
                let timeout_ms = self.config.request_timeout_ms;
                tokio::spawn(async move {
                    let key = metadata.key;
                    let outcome =
                        tokio::time::timeout(timeout, store.remove_blob(&container, &key)).await;
                    match outcome {
                        Ok(result) => result,
                        Err(_) => Err(CirrusError::Timeout {
                            container,
                            key,
                            operation: "remove_blob",
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
                tracing::warn!("Delete failed while clearing {}: {}", container, error);
                failed += 1;
                first_cause.get_or_insert(error);
            }
        }

        match first_cause {
            None => Ok(()),
            Some(cause) => Err(CirrusError::Partial {
                operation: "clear",
                container: container.to_string(),
                failed,
                source: Box::new(cause),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;
    use crate::store::MemoryBlobStore;

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store = Arc::new(MemoryBlobStore::new());
        store.create_container("c1").await.unwrap();
        for key in ["a", "b", "nested/c"] {
            store.put_blob("c1", Blob::new(key, "v")).await.unwrap();
        }

        let handle: Arc<dyn BlobStore> = store.clone();
        let strategy = FanoutClearContainerStrategy::new(handle, MapConfig::default());
        strategy.execute("c1").await.unwrap();

        let listing = store
            .list_blobs("c1", &ListOptions::default())
            .await
            .unwrap();
        assert!(listing.is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_carries_first_cause() {
        let store = Arc::new(MemoryBlobStore::new());
        store.create_container("c1").await.unwrap();
        for key in ["a", "b", "c"] {
            store.put_blob("c1", Blob::new(key, "v")).await.unwrap();
        }
        store.fail_next_removes("c1", "b", 1);

        let handle: Arc<dyn BlobStore> = store.clone();
        let strategy = FanoutClearContainerStrategy::new(handle, MapConfig::default());
        let err = strategy.execute("c1").await.unwrap_err();
        match err {
            CirrusError::Partial {
                operation,
                failed,
                source,
                ..
            } => {
                assert_eq!(operation, "clear");
                assert_eq!(failed, 1);
                assert!(matches!(*source, CirrusError::Internal(_)));
            }
            other => panic!("expected partial failure, got {:?}", other),
        }

        // Completed deletes are not rolled back; only the failed key stays.
        let listing = store
            .list_blobs("c1", &ListOptions::default())
            .await
            .unwrap();
        let keys: Vec<&str> = listing.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["b"]);
    }

    #[tokio::test]
    async fn test_clear_empty_container_is_noop() {
        let store = Arc::new(MemoryBlobStore::new());
        store.create_container("c1").await.unwrap();

        let strategy = FanoutClearContainerStrategy::new(store, MapConfig::default());
        strategy.execute("c1").await.unwrap();
    }
}
