use crate::blob::{Blob, Payload};
use crate::config::MapConfig;
use crate::error::{CirrusError, Result};
use crate::map::BaseBlobMap;
use crate::store::{BlobStore, GetOptions};
use bytes::Bytes;
use futures::future::join_all;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Raw-bytes map view over a container.
///
/// All put variants funnel through one routine that materializes the
/// payload source in memory and computes the MD5 etag before upload. That
/// buffers whole payloads; the etag must be known up front to confirm the
/// write, so this trades memory for a simpler integrity check. File and
/// string sources are consumed whole.
pub struct BytesMap {
    base: BaseBlobMap,
}

impl BytesMap {
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

    /// Fetch the raw bytes stored under `key`.
    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let container = self.base.container().to_string();
        let store = Arc::clone(self.base.store());
        let fetched = self
            .base
            .bounded("get_blob", key, async move {
                store.get_blob(&container, key, &GetOptions::default()).await
            })
            .await?;
        Ok(fetched.map(|blob| blob.payload))
    }

    /// Store a payload under `key`, answering the prior bytes.
    pub async fn put(&self, key: &str, payload: impl Into<Payload>) -> Result<Option<Bytes>> {
        let prior = self.get(key).await?;
        let blob = Self::to_blob(key.to_string(), payload.into()).await?;

        let container = self.base.container().to_string();
        let store = Arc::clone(self.base.store());
        self.base
            .bounded("put_blob", key, async move {
                store.put_blob(&container, blob).await
            })
            .await?;
        Ok(prior)
    }

    pub async fn put_bytes(&self, key: &str, bytes: impl Into<Bytes>) -> Result<Option<Bytes>> {
        self.put(key, Payload::Bytes(bytes.into())).await
    }

    pub async fn put_string(&self, key: &str, value: impl Into<String>) -> Result<Option<Bytes>> {
        self.put(key, Payload::Str(value.into())).await
    }

    pub async fn put_file(&self, key: &str, path: impl Into<PathBuf>) -> Result<Option<Bytes>> {
        self.put(key, Payload::File(path.into())).await
    }

    /// Upload every entry concurrently; partial failure surfaces once all
    /// members have been drained, without rolling back completed writes.
    pub async fn put_all<I, P>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, P)>,
        P: Into<Payload>,
    {
        let container = self.base.container().to_string();
        let timeout = self.base.config().request_timeout();
        let timeout_ms = self.base.config().request_timeout_ms;

        let handles: Vec<_> = entries
            .into_iter()
            .map(|(key, payload)| {
                let store = Arc::clone(self.base.store());
                let container = container.clone();
                let payload = payload.into();
                tokio::spawn(async move {
                    let blob = Self::to_blob(key.clone(), payload).await?;
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

    pub async fn put_all_bytes<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Bytes)>,
    {
        self.put_all(
            entries
                .into_iter()
                .map(|(key, bytes)| (key, Payload::Bytes(bytes))),
        )
        .await
    }

    pub async fn put_all_strings<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.put_all(entries.into_iter().map(|(key, s)| (key, Payload::Str(s))))
            .await
    }

    pub async fn put_all_files<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, PathBuf)>,
    {
        self.put_all(
            entries
                .into_iter()
                .map(|(key, path)| (key, Payload::File(path))),
        )
        .await
    }

    /// Delete `key`, answering the prior bytes. Absence is not an error.
    pub async fn remove(&self, key: &str) -> Result<Option<Bytes>> {
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

    /// Every payload in the container, via the fan-out fetch strategy.
    pub async fn values(&self) -> Result<Vec<Bytes>> {
        let blobs = self
            .base
            .get_blobs_strategy()
            .execute(self.base.container())
            .await?;
        Ok(blobs.into_iter().map(|blob| blob.payload).collect())
    }

    /// Every (key, payload) pair in the container.
    pub async fn entries(&self) -> Result<Vec<(String, Bytes)>> {
        let blobs = self
            .base
            .get_blobs_strategy()
            .execute(self.base.container())
            .await?;
        Ok(blobs
            .into_iter()
            .map(|blob| (blob.key().to_string(), blob.payload))
            .collect())
    }

    // The single funnel: materialize the source, then build the blob so the
    // etag is computed over exactly the bytes that go out.
    async fn to_blob(key: String, payload: Payload) -> Result<Blob> {
        let bytes = payload.materialize().await?;
        Ok(Blob::new(key, bytes))
    }
}
