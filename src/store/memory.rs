use crate::blob::{Blob, BlobMetadata, ContainerMetadata, compute_etag};
use crate::error::{CirrusError, Result};
use crate::store::{BlobStore, ByteRange, GetOptions, ListOptions};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::RwLock;

/// In-memory [`BlobStore`] keeping all data in a local map.
///
/// Used as a transient backend and as the test double for code exercising
/// the map facades. Writes stamp `last_modified` and recompute the etag
/// over the stored bytes, the way a real store would.
#[derive(Default)]
pub struct MemoryBlobStore {
    containers: RwLock<HashMap<String, HashMap<String, Blob>>>,
    // (container, key) -> remaining calls that must misbehave.
    read_faults: Mutex<FaultMap>,
    write_faults: Mutex<FaultMap>,
    remove_faults: Mutex<FaultMap>,
}

type FaultMap = HashMap<(String, String), u32>;

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `attempts` reads of `key` answer `Ok(None)` while the
    /// key stays visible in listings. Simulates list-then-get
    /// read-after-write inconsistency.
    pub fn fail_next_reads(&self, container: &str, key: &str, attempts: u32) {
        Self::arm_fault(&self.read_faults, container, key, attempts);
    }

    /// Make the next `attempts` puts of `key` fail with a store error.
    pub fn fail_next_writes(&self, container: &str, key: &str, attempts: u32) {
        Self::arm_fault(&self.write_faults, container, key, attempts);
    }

    /// Make the next `attempts` removes of `key` fail with a store error.
    pub fn fail_next_removes(&self, container: &str, key: &str, attempts: u32) {
        Self::arm_fault(&self.remove_faults, container, key, attempts);
    }

    fn arm_fault(faults: &Mutex<FaultMap>, container: &str, key: &str, attempts: u32) {
        let mut faults = faults.lock().unwrap_or_else(|e| e.into_inner());
        faults.insert((container.to_string(), key.to_string()), attempts);
    }

    fn consume_fault(faults: &Mutex<FaultMap>, container: &str, key: &str) -> bool {
        let mut faults = faults.lock().unwrap_or_else(|e| e.into_inner());
        let entry = (container.to_string(), key.to_string());
        match faults.get_mut(&entry) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                if *remaining == 0 {
                    faults.remove(&entry);
                }
                true
            }
            _ => {
                faults.remove(&entry);
                false
            }
        }
    }

    fn apply_range(payload: &Bytes, range: &ByteRange) -> Result<Bytes> {
        let len = payload.len() as u64;
        let (start, end) = match range {
            ByteRange::Bounded { first, last } => {
                if first > last {
                    return Err(CirrusError::InvalidRange(format!("{}-{}", first, last)));
                }
                (*first, last.saturating_add(1).min(len))
            }
            ByteRange::From(offset) => (*offset, len),
            ByteRange::Suffix(n) => (len.saturating_sub(*n), len),
        };
        if start > len {
            return Err(CirrusError::InvalidRange(format!(
                "start {} beyond length {}",
                start, len
            )));
        }
        Ok(payload.slice(start as usize..end as usize))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list_containers(&self) -> Result<Vec<ContainerMetadata>> {
        let containers = self.containers.read().await;
        let mut names: Vec<ContainerMetadata> = containers
            .keys()
            .map(|name| ContainerMetadata::new(name.clone()))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn create_container(&self, name: &str) -> Result<bool> {
        let mut containers = self.containers.write().await;
        containers.entry(name.to_string()).or_default();
        Ok(containers.contains_key(name))
    }

    async fn delete_container(&self, name: &str) -> Result<()> {
        let mut containers = self.containers.write().await;
        containers.remove(name);
        Ok(())
    }

    async fn container_exists(&self, name: &str) -> Result<bool> {
        let containers = self.containers.read().await;
        Ok(containers.contains_key(name))
    }

    async fn list_blobs(
        &self,
        container: &str,
        options: &ListOptions,
    ) -> Result<Vec<BlobMetadata>> {
        let containers = self.containers.read().await;
        let blobs = containers
            .get(container)
            .ok_or_else(|| CirrusError::ContainerNotFound(container.to_string()))?;

        let mut listing: Vec<BlobMetadata> = blobs
            .values()
            .map(|blob| blob.metadata.clone())
            .filter(|metadata| match &options.prefix {
                Some(prefix) => metadata.key.starts_with(prefix.as_str()),
                None => true,
            })
            .collect();
        listing.sort_by(|a, b| a.key.cmp(&b.key));

        if let Some(max) = options.max_results {
            listing.truncate(max);
        }
        Ok(listing)
    }

    async fn blob_metadata(&self, container: &str, key: &str) -> Result<Option<BlobMetadata>> {
        let containers = self.containers.read().await;
        let blobs = containers
            .get(container)
            .ok_or_else(|| CirrusError::ContainerNotFound(container.to_string()))?;

        if Self::consume_fault(&self.read_faults, container, key) {
            return Ok(None);
        }
        Ok(blobs.get(key).map(|blob| blob.metadata.clone()))
    }

    async fn get_blob(
        &self,
        container: &str,
        key: &str,
        options: &GetOptions,
    ) -> Result<Option<Blob>> {
        let containers = self.containers.read().await;
        let blobs = containers
            .get(container)
            .ok_or_else(|| CirrusError::ContainerNotFound(container.to_string()))?;

        if Self::consume_fault(&self.read_faults, container, key) {
            return Ok(None);
        }

        let blob = match blobs.get(key) {
            Some(blob) => blob,
            None => return Ok(None),
        };

        let mut returned = blob.clone();
        if let Some(range) = &options.range {
            returned.payload = Self::apply_range(&blob.payload, range)?;
        }
        Ok(Some(returned))
    }

    async fn put_blob(&self, container: &str, blob: Blob) -> Result<String> {
        if Self::consume_fault(&self.write_faults, container, &blob.metadata.key) {
            return Err(CirrusError::Internal(format!(
                "simulated write failure: {}/{}",
                container, blob.metadata.key
            )));
        }

        let mut containers = self.containers.write().await;
        let blobs = containers
            .get_mut(container)
            .ok_or_else(|| CirrusError::ContainerNotFound(container.to_string()))?;

        let mut stored = blob;
        stored.metadata.last_modified = Utc::now();
        stored.metadata.size_bytes = stored.payload.len() as u64;
        stored.metadata.etag = compute_etag(&stored.payload);
        let etag = stored.metadata.etag.clone();

        tracing::debug!(
            "Stored blob {}/{} ({} bytes, etag {})",
            container,
            stored.metadata.key,
            stored.metadata.size_bytes,
            etag
        );
        blobs.insert(stored.metadata.key.clone(), stored);
        Ok(etag)
    }

    async fn remove_blob(&self, container: &str, key: &str) -> Result<()> {
        if Self::consume_fault(&self.remove_faults, container, key) {
            return Err(CirrusError::Internal(format!(
                "simulated remove failure: {}/{}",
                container, key
            )));
        }

        let mut containers = self.containers.write().await;
        if let Some(blobs) = containers.get_mut(container) {
            blobs.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_container_lifecycle() {
        let store = MemoryBlobStore::new();
        assert!(!store.container_exists("c1").await.unwrap());

        assert!(store.create_container("c1").await.unwrap());
        assert!(store.container_exists("c1").await.unwrap());
        // Create is idempotent.
        assert!(store.create_container("c1").await.unwrap());

        let containers = store.list_containers().await.unwrap();
        assert_eq!(containers, vec![ContainerMetadata::new("c1")]);

        store.delete_container("c1").await.unwrap();
        assert!(!store.container_exists("c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_get_remove_blob() {
        let store = MemoryBlobStore::new();
        store.create_container("c1").await.unwrap();

        let etag = store
            .put_blob("c1", Blob::new("a", "payload-a"))
            .await
            .unwrap();
        assert_eq!(etag, compute_etag(b"payload-a"));

        let blob = store
            .get_blob("c1", "a", &GetOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(blob.payload, Bytes::from_static(b"payload-a"));
        assert_eq!(blob.etag(), etag);

        store.remove_blob("c1", "a").await.unwrap();
        assert!(store
            .get_blob("c1", "a", &GetOptions::default())
            .await
            .unwrap()
            .is_none());
        // Removing an absent key is fine.
        store.remove_blob("c1", "a").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_container_is_an_error() {
        let store = MemoryBlobStore::new();
        let err = store
            .get_blob("nope", "k", &GetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CirrusError::ContainerNotFound(_)));

        let err = store
            .list_blobs("nope", &ListOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CirrusError::ContainerNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let store = MemoryBlobStore::new();
        store.create_container("c1").await.unwrap();
        for key in ["dir/a", "dir/b", "other"] {
            store.put_blob("c1", Blob::new(key, "x")).await.unwrap();
        }

        let listing = store
            .list_blobs("c1", &ListOptions::prefix("dir/"))
            .await
            .unwrap();
        let keys: Vec<&str> = listing.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["dir/a", "dir/b"]);
    }

    #[tokio::test]
    async fn test_get_blob_ranges() {
        let store = MemoryBlobStore::new();
        store.create_container("c1").await.unwrap();
        store
            .put_blob("c1", Blob::new("k", "0123456789"))
            .await
            .unwrap();

        let bounded = store
            .get_blob(
                "c1",
                "k",
                &GetOptions::range(ByteRange::Bounded { first: 2, last: 4 }),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bounded.payload, Bytes::from_static(b"234"));

        let from = store
            .get_blob("c1", "k", &GetOptions::range(ByteRange::From(7)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(from.payload, Bytes::from_static(b"789"));

        let suffix = store
            .get_blob("c1", "k", &GetOptions::range(ByteRange::Suffix(2)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(suffix.payload, Bytes::from_static(b"89"));
    }

    #[tokio::test]
    async fn test_bounded_range_clamps_to_payload_length() {
        let store = MemoryBlobStore::new();
        store.create_container("c1").await.unwrap();
        store
            .put_blob("c1", Blob::new("k", "0123456789"))
            .await
            .unwrap();

        // An oversized upper bound clamps instead of overflowing.
        let whole = store
            .get_blob(
                "c1",
                "k",
                &GetOptions::range(ByteRange::Bounded {
                    first: 0,
                    last: u64::MAX,
                }),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(whole.payload, Bytes::from_static(b"0123456789"));

        let tail = store
            .get_blob(
                "c1",
                "k",
                &GetOptions::range(ByteRange::Bounded {
                    first: 4,
                    last: u64::MAX,
                }),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tail.payload, Bytes::from_static(b"456789"));
    }

    #[tokio::test]
    async fn test_write_and_remove_fault_injection() {
        let store = MemoryBlobStore::new();
        store.create_container("c1").await.unwrap();

        store.fail_next_writes("c1", "k", 1);
        assert!(store.put_blob("c1", Blob::new("k", "v")).await.is_err());
        store.put_blob("c1", Blob::new("k", "v")).await.unwrap();

        store.fail_next_removes("c1", "k", 1);
        assert!(store.remove_blob("c1", "k").await.is_err());
        store.remove_blob("c1", "k").await.unwrap();
        assert!(store
            .get_blob("c1", "k", &GetOptions::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_read_fault_injection() {
        let store = MemoryBlobStore::new();
        store.create_container("c1").await.unwrap();
        store.put_blob("c1", Blob::new("k", "v")).await.unwrap();

        store.fail_next_reads("c1", "k", 2);

        // Still listed while unreadable.
        let listing = store
            .list_blobs("c1", &ListOptions::default())
            .await
            .unwrap();
        assert_eq!(listing.len(), 1);

        for _ in 0..2 {
            assert!(store
                .get_blob("c1", "k", &GetOptions::default())
                .await
                .unwrap()
                .is_none());
        }
        assert!(store
            .get_blob("c1", "k", &GetOptions::default())
            .await
            .unwrap()
            .is_some());
    }
}
