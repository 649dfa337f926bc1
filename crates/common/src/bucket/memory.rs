use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use super::{Bucket, BucketError};
use crate::container::{KeyedContainer, MemoryContainer};
use crate::encoding::{Hash, Identity, Manifest, Slice};

/// In-memory bucket for node-local storage
///
/// Manifests and their slices live in [`MemoryContainer`] registries; a
/// separate size ledger gates every insert so the bucket can never exceed
/// its capacity, even under concurrent adds. Cheap to clone and share.
#[derive(Debug, Clone)]
pub struct MemoryBucket {
    max_size: u64,
    owner: Identity,
    pool: Identity,
    selfness: Identity,
    manifests: MemoryContainer<Uuid, Manifest>,
    slices: MemoryContainer<Uuid, MemoryContainer<Hash, Slice>>,
    stored: Arc<Mutex<u64>>,
}

impl MemoryBucket {
    pub fn new(max_size: u64, owner: Identity, pool: Identity, selfness: Identity) -> Self {
        Self {
            max_size,
            owner,
            pool,
            selfness,
            manifests: MemoryContainer::new(),
            slices: MemoryContainer::new(),
            stored: Arc::new(Mutex::new(0)),
        }
    }

    /// Register a manifest; `false` if its id is already taken
    pub fn try_add_manifest(&self, manifest: Manifest) -> bool {
        self.manifests.try_add(manifest.id(), manifest)
    }

    /// Store one slice for a registered manifest
    ///
    /// `false` if the manifest is unknown, the slice is already held, or
    /// storing it would push the bucket past its capacity.
    pub fn try_add_slice(&self, manifest: &Manifest, slice: Slice) -> bool {
        if self.manifests.try_get(&manifest.id()).is_none() {
            return false;
        }
        let registry = self.slice_registry(manifest.id());

        // the ledger is the capacity gate; holding it across the insert
        // keeps concurrent adds from overshooting max_size together
        let mut stored = self.stored.lock().unwrap_or_else(PoisonError::into_inner);
        let incoming = slice.stored_len();
        if *stored + incoming > self.max_size {
            tracing::debug!(
                manifest = %manifest.id(),
                stored = *stored,
                incoming,
                max = self.max_size,
                "rejecting slice, bucket at capacity"
            );
            return false;
        }
        if !registry.try_add(slice.hash(), slice) {
            return false;
        }
        *stored += incoming;
        true
    }

    fn slice_registry(&self, id: Uuid) -> MemoryContainer<Hash, Slice> {
        loop {
            if let Some(registry) = self.slices.try_get(&id) {
                return registry;
            }
            self.slices.try_add(id, MemoryContainer::new());
        }
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    async fn max_size(&self) -> Result<u64, BucketError> {
        Ok(self.max_size)
    }

    async fn current_size(&self) -> Result<u64, BucketError> {
        Ok(*self.stored.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn owner_identity(&self) -> Result<Identity, BucketError> {
        Ok(self.owner)
    }

    async fn pool_identity(&self) -> Result<Identity, BucketError> {
        Ok(self.pool)
    }

    async fn self_identity(&self) -> Result<Identity, BucketError> {
        Ok(self.selfness)
    }

    async fn manifests(&self) -> Result<Vec<Manifest>, BucketError> {
        Ok(self.manifests.values())
    }

    async fn hashes(&self, manifest: &Manifest) -> Result<Vec<Hash>, BucketError> {
        Ok(self
            .slices
            .try_get(&manifest.id())
            .map(|registry| registry.keys())
            .unwrap_or_default())
    }

    async fn slices(
        &self,
        manifest: &Manifest,
        hashes: &[Hash],
    ) -> Result<Vec<Slice>, BucketError> {
        let Some(registry) = self.slices.try_get(&manifest.id()) else {
            return Ok(Vec::new());
        };
        // requested hashes we no longer hold are skipped, not an error
        Ok(hashes
            .iter()
            .filter_map(|hash| registry.try_get(hash))
            .collect())
    }
}

#[cfg(test)]
mod test {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::encoding::generate_slices;

    fn identities() -> (Identity, Identity, Identity) {
        (
            Identity::from_bytes([1; 32]),
            Identity::from_bytes([2; 32]),
            Identity::from_bytes([3; 32]),
        )
    }

    #[tokio::test]
    async fn test_identities_and_sizes() {
        let (owner, pool, selfness) = identities();
        let bucket = MemoryBucket::new(1024, owner, pool, selfness);

        assert_eq!(bucket.max_size().await.unwrap(), 1024);
        assert_eq!(bucket.current_size().await.unwrap(), 0);
        assert_eq!(bucket.owner_identity().await.unwrap(), owner);
        assert_eq!(bucket.pool_identity().await.unwrap(), pool);
        assert_eq!(bucket.self_identity().await.unwrap(), selfness);
    }

    #[tokio::test]
    async fn test_stores_and_serves_slices() {
        let (owner, pool, selfness) = identities();
        let bucket = MemoryBucket::new(1024, owner, pool, selfness);

        let data = vec![7u8; 100];
        let manifest = Manifest::describe(&data, 8);
        let slices = generate_slices(&data, 4, 8, &mut StdRng::seed_from_u64(1)).unwrap();

        assert!(bucket.try_add_manifest(manifest));
        for slice in &slices {
            // duplicate combinations dedupe by content hash; that's fine
            bucket.try_add_slice(&manifest, slice.clone());
        }

        assert_eq!(bucket.manifests().await.unwrap(), vec![manifest]);
        let mut served = bucket.hashes(&manifest).await.unwrap();
        let mut expected: Vec<Hash> = slices.iter().map(|s| s.hash()).collect();
        served.sort();
        expected.sort();
        expected.dedup();
        assert_eq!(served, expected);
    }

    #[tokio::test]
    async fn test_unknown_manifest_is_empty_not_error() {
        let (owner, pool, selfness) = identities();
        let bucket = MemoryBucket::new(1024, owner, pool, selfness);
        let unknown = Manifest::describe(b"never registered", 4);

        assert!(bucket.hashes(&unknown).await.unwrap().is_empty());
        assert!(bucket
            .slices(&unknown, &[Hash::digest(b"x")])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_capacity_is_never_exceeded() {
        let (owner, pool, selfness) = identities();
        // room for two 25-byte symbols, not three
        let bucket = MemoryBucket::new(50, owner, pool, selfness);

        let data = vec![1u8; 100];
        let manifest = Manifest::describe(&data, 6);
        let slices = generate_slices(&data, 4, 6, &mut StdRng::seed_from_u64(2)).unwrap();
        bucket.try_add_manifest(manifest);

        let mut accepted = 0;
        for slice in slices {
            if bucket.try_add_slice(&manifest, slice) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 2);
        assert!(bucket.current_size().await.unwrap() <= bucket.max_size().await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_slice_for_unregistered_manifest() {
        let (owner, pool, selfness) = identities();
        let bucket = MemoryBucket::new(1024, owner, pool, selfness);
        let manifest = Manifest::describe(b"data", 1);

        let slice = Slice::new(vec![true], b"data".to_vec());
        assert!(!bucket.try_add_slice(&manifest, slice));
    }
}
