pub mod memory;

use crate::blob::{Blob, BlobMetadata, ContainerMetadata};
use crate::error::Result;
use async_trait::async_trait;

pub use memory::MemoryBlobStore;

/// Byte-range selector for partial reads, mirroring HTTP range forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteRange {
    /// first..=last, inclusive on both ends.
    Bounded { first: u64, last: u64 },
    /// Everything from an offset to the end.
    From(u64),
    /// The final `n` bytes.
    Suffix(u64),
}

#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub range: Option<ByteRange>,
}

impl GetOptions {
    pub fn range(range: ByteRange) -> Self {
        Self { range: Some(range) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub max_results: Option<usize>,
}

impl ListOptions {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            max_results: None,
        }
    }
}

/// Asynchronous connection to a remote blob store.
///
/// Key absence is a value, not an error: lookups answer `Ok(None)` for a
/// missing key. A missing container is `CirrusError::ContainerNotFound`.
/// Implementations are expected to be eventually consistent; callers that
/// need list-then-get coherence go through the strategy layer.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn list_containers(&self) -> Result<Vec<ContainerMetadata>>;

    /// Idempotent create. Answers whether the container exists afterwards.
    async fn create_container(&self, name: &str) -> Result<bool>;

    async fn delete_container(&self, name: &str) -> Result<()>;

    async fn container_exists(&self, name: &str) -> Result<bool>;

    async fn list_blobs(&self, container: &str, options: &ListOptions)
        -> Result<Vec<BlobMetadata>>;

    async fn blob_metadata(&self, container: &str, key: &str) -> Result<Option<BlobMetadata>>;

    async fn get_blob(
        &self,
        container: &str,
        key: &str,
        options: &GetOptions,
    ) -> Result<Option<Blob>>;

    /// Store a blob, returning the etag computed over the stored bytes.
    async fn put_blob(&self, container: &str, blob: Blob) -> Result<String>;

    /// Remove a blob. Removing an absent key is not an error.
    async fn remove_blob(&self, container: &str, key: &str) -> Result<()>;
}
