//! The storage data model
//!
//! A stored object is described once by a [`Manifest`] and carried as
//! erasure-coded [`Slice`]s, each addressed by its content [`Hash`].
//! [`Identity`] names the principals in a bucket relationship. All four are
//! immutable values; a changed object is a new manifest.

mod slices;

pub use slices::{generate_slices, reconstruct, SliceError};

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::crypto::PublicKey;

/// Size of a content digest in bytes
pub const HASH_SIZE: usize = 32;

/// Fixed-size digest identifying a content chunk
///
/// Equality and ordering are by byte value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    /// Digest arbitrary bytes (SHA-256)
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Opaque principal identifier
///
/// Names the owner, pool, and self roles in a bucket relationship. Derived
/// from a peer's public key, so proving possession of the matching private
/// key (the handshake) is what ties a network peer to an identity. Immutable
/// once issued.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Identity([u8; HASH_SIZE]);

impl Identity {
    pub fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<&PublicKey> for Identity {
    fn from(key: &PublicKey) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.to_bytes());
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Describes one logical stored object
///
/// Created when an object is registered for storage and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Manifest {
    id: Uuid,
    length: u64,
    num_slices: u32,
}

impl Manifest {
    pub fn new(id: Uuid, length: u64, num_slices: u32) -> Self {
        Self {
            id,
            length,
            num_slices,
        }
    }

    /// Register a new object: a fresh identifier for this data, split into
    /// `num_slices` encoded slices
    pub fn describe(data: &[u8], num_slices: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            length: data.len() as u64,
            num_slices,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Total byte length of the original object
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Number of encoded slices the object was split into
    pub fn num_slices(&self) -> u32 {
        self.num_slices
    }
}

/// One erasure-coded fragment of an object's data
///
/// `coefficients` holds one flag per original data block; the flagged blocks
/// were XORed (combined over GF(2)) to produce `symbol`. Any set of slices
/// with linearly independent coefficient vectors, at least as many as there
/// are blocks, reconstructs the object — see [`reconstruct`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    coefficients: Vec<bool>,
    symbol: Vec<u8>,
}

impl Slice {
    pub fn new(coefficients: Vec<bool>, symbol: Vec<u8>) -> Self {
        Self {
            coefficients,
            symbol,
        }
    }

    pub fn coefficients(&self) -> &[bool] {
        &self.coefficients
    }

    pub fn symbol(&self) -> &[u8] {
        &self.symbol
    }

    /// Content hash over the canonical (bincode) encoding; the slice's
    /// address within a bucket
    pub fn hash(&self) -> Hash {
        let bytes = bincode::serialize(self).expect("slice serialization is infallible");
        Hash::digest(&bytes)
    }

    /// Bytes this slice occupies against a bucket's capacity
    pub fn stored_len(&self) -> u64 {
        self.symbol.len() as u64
    }
}
