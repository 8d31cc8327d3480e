//! Cirrusmap - map-style client toolkit for eventually consistent blob stores
//!
//! Treat a remote container as a key-value map:
//! - `BlobMap` / `BytesMap` facades over any [`store::BlobStore`]
//! - pluggable container strategies with bounded retry-on-absent fetches
//! - MD5 etags for content equality and integrity checks
//! - an in-memory stub compute provider for testing provisioning code

pub mod blob;
pub mod compute;
pub mod config;
pub mod error;
pub mod map;
pub mod store;
pub mod strategy;

pub use blob::{Blob, BlobMetadata, ContainerMetadata, Payload, compute_etag, verify_etag};
pub use compute::{
    Hardware, Image, Location, LoginCredentials, NodeMetadata, NodeReachable, NodeState,
    StubComputeConfig, StubComputeService,
};
pub use config::MapConfig;
pub use error::{CirrusError, Result};
pub use map::{BaseBlobMap, blob_map::BlobMap, bytes_map::BytesMap};
pub use store::{BlobStore, ByteRange, GetOptions, ListOptions, MemoryBlobStore};
pub use strategy::{
    ClearContainerStrategy, ContainsValueStrategy, CountBlobsStrategy, DigestContainsValueStrategy,
    FanoutClearContainerStrategy, GetBlobsStrategy, ListBlobMetadataStrategy,
    ListContainerMetadataStrategy, MetadataCountStrategy, RetryOnAbsentGetBlobsStrategy,
};
