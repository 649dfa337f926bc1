//! In-process harness for multi-peer tests
//!
//! Wires two "nodes" together over an in-memory duplex stream, without any
//! real networking. Used by the integration tests under `tests/` and handy
//! for downstream crates exercising the protocol.
//!
//! ```rust,ignore
//! use common::testkit;
//!
//! let (a, b) = testkit::link();
//! let (ours, theirs) = (SecretKey::generate(), SecretKey::generate());
//! let (outcome_a, outcome_b) = testkit::handshake_pair(&ours, &theirs, timeout).await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::io::DuplexStream;

use crate::bucket::{serve_bucket, Bucket, MemoryBucket};
use crate::crypto::{Ed25519Challenge, SecretKey};
use crate::encoding::{generate_slices, Identity, Manifest, Slice};
use crate::handshake::{Handshake, HandshakeError, HandshakeOutcome};
use crate::protocol::FramedProtocol;

/// An in-memory duplex byte link between two peers
pub fn link() -> (DuplexStream, DuplexStream) {
    tokio::io::duplex(64 * 1024)
}

/// Run the mutual handshake between two keypairs over an in-memory link
///
/// Returns both sides' outcomes, left for `ours`, right for `theirs`.
pub async fn handshake_pair(
    ours: &SecretKey,
    theirs: &SecretKey,
    timeout: Duration,
) -> (
    Result<HandshakeOutcome, HandshakeError>,
    Result<HandshakeOutcome, HandshakeError>,
) {
    let (mut stream_a, mut stream_b) = link();
    let handshake = Handshake::new(Ed25519Challenge);
    tokio::join!(
        handshake.authenticate(&mut stream_a, ours, timeout),
        handshake.authenticate(&mut stream_b, theirs, timeout),
    )
}

/// Serve `bucket` on one end of an in-memory link and hand back a protocol
/// connected to the other
pub fn wire_bucket<B>(bucket: Arc<B>) -> FramedProtocol
where
    B: Bucket + 'static,
{
    let (client_end, server_end) = link();
    tokio::spawn(async move {
        if let Err(e) = serve_bucket(server_end, bucket).await {
            tracing::debug!("test bucket service ended: {}", e);
        }
    });
    FramedProtocol::connect(client_end)
}

/// A populated in-memory bucket: one registered object split over four
/// source blocks, every generated slice stored
pub fn seeded_bucket(data: &[u8], num_slices: u32) -> (MemoryBucket, Manifest, Vec<Slice>) {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let bucket = MemoryBucket::new(
        1024 * 1024,
        Identity::from_bytes([1; 32]),
        Identity::from_bytes([2; 32]),
        Identity::from_bytes([3; 32]),
    );
    let manifest = Manifest::describe(data, num_slices);
    let slices = generate_slices(data, 4, num_slices as usize, &mut StdRng::seed_from_u64(99))
        .expect("at least one source block");

    bucket.try_add_manifest(manifest);
    for slice in &slices {
        bucket.try_add_slice(&manifest, slice.clone());
    }
    (bucket, manifest, slices)
}
