/**
 * Storage bucket contract and implementations.
 *  - the operation surface every bucket exposes
 *  - an in-memory bucket for node-local storage
 *  - a network-transparent remote proxy and the
 *    serving loop that answers it
 */
pub mod bucket;
/**
 * Generic store-by-key registries used to hold
 *  buckets, manifests, and slices by identity.
 */
pub mod container;
/**
 * Cryptographic types and operations.
 *  - Public and Private key implementations
 *  - the challenge signing seam used by the handshake
 */
pub mod crypto;
/**
 * The storage data model: manifests, content hashes,
 *  and erasure-coded slices, plus generation and
 *  reconstruction of slices over GF(2).
 */
pub mod encoding;
/**
 * Mutual authentication between two peers over any
 *  ordered byte stream. Each side proves possession
 *  of its private key by signing the XOR of both
 *  sides' fresh challenges.
 */
pub mod handshake;
/**
 * Typed remote procedure calls: named methods with
 *  pluggable payload codecs, multiplexed over a
 *  single framed connection.
 */
pub mod protocol;
/**
 * In-process harness for wiring peers together over
 *  in-memory streams in tests.
 */
pub mod testkit;
/**
 * Length-prefixed chunk framing shared by the
 *  handshake and the framed protocol.
 */
pub mod wire;

pub mod prelude {
    pub use crate::bucket::{Bucket, BucketError, MemoryBucket, RemoteBucket, RemoteBucketFactory};
    pub use crate::crypto::{ChallengeCrypto, Ed25519Challenge, PublicKey, SecretKey};
    pub use crate::encoding::{Hash, Identity, Manifest, Slice};
    pub use crate::handshake::{Handshake, HandshakeOutcome};
    pub use crate::protocol::{FramedProtocol, Method, Protocol};
}
