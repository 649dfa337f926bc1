//! The bucket contract and its implementations
//!
//! A bucket is a capacity-bounded container of slices for a set of
//! manifests, tied to three principal identities: its owner, the pool it
//! participates in, and whoever is acting as "self" in the relationship.
//! The same contract is served by [`MemoryBucket`] locally and
//! [`RemoteBucket`] across a connection; callers cannot tell them apart.

mod memory;
mod remote;
mod service;

pub use memory::MemoryBucket;
pub use remote::{RemoteBucket, RemoteBucketFactory};
pub use service::serve_bucket;

use async_trait::async_trait;

use crate::encoding::{Hash, Identity, Manifest, Slice};
use crate::protocol::MethodError;

/// Wire names of the bucket operations, shared by the remote proxy and the
/// serving loop
pub mod ops {
    pub const GET_CURRENT_SIZE: &str = "get_current_size";
    pub const GET_MAX_SIZE: &str = "get_max_size";
    pub const GET_OWNER_IDENTITY: &str = "get_owner_identity";
    pub const GET_POOL_IDENTITY: &str = "get_pool_identity";
    pub const GET_SELF_IDENTITY: &str = "get_self_identity";
    pub const GET_MANIFESTS: &str = "get_manifests";
    pub const GET_HASHES: &str = "get_hashes";
    pub const GET_SLICES: &str = "get_slices";
}

#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    /// A remote invocation failed; the kind (encode, decode, timeout,
    /// transport) survives the mapping so callers can tell them apart
    #[error("remote invocation failed: {0}")]
    Invocation(#[from] MethodError),
}

/// What any bucket exposes, local or remote
///
/// All operations are reads; how slices get *into* a bucket is the owning
/// node's business (see [`MemoryBucket`]'s inherent methods). Every
/// implementation upholds `current_size() <= max_size()`.
#[async_trait]
pub trait Bucket: Send + Sync {
    /// Capacity ceiling in bytes; constant per bucket instance
    async fn max_size(&self) -> Result<u64, BucketError>;

    /// Bytes currently stored
    async fn current_size(&self) -> Result<u64, BucketError>;

    async fn owner_identity(&self) -> Result<Identity, BucketError>;
    async fn pool_identity(&self) -> Result<Identity, BucketError>;
    async fn self_identity(&self) -> Result<Identity, BucketError>;

    /// All manifests currently held
    async fn manifests(&self) -> Result<Vec<Manifest>, BucketError>;

    /// Identifiers of the slices available for a manifest; empty if the
    /// manifest is unknown here
    async fn hashes(&self, manifest: &Manifest) -> Result<Vec<Hash>, BucketError>;

    /// Fetch slice bodies for the requested hash set
    ///
    /// May return fewer slices than requested (some may have been evicted);
    /// a short result is a valid outcome, not an error. Callers fetch what
    /// they can and must not assume exact correspondence.
    async fn slices(&self, manifest: &Manifest, hashes: &[Hash])
        -> Result<Vec<Slice>, BucketError>;
}
