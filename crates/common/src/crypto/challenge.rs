use super::keys::{PublicKey, SecretKey};

/// Signs and verifies challenge buffers with an asymmetric keypair
///
/// This is the seam between the authentication handshake and the concrete
/// signature primitive. The handshake only ever signs the XOR of two fresh
/// nonces and checks the peer's signature over the same bytes, so any
/// detached-signature scheme fits behind this trait.
///
/// Implementations must not have side effects. Verification of a bad or
/// malformed signature returns `false`, never an error; malformed *key*
/// material is rejected earlier, when the key record is parsed off the wire.
pub trait ChallengeCrypto: Send + Sync {
    /// Produce a detached signature of `message` with the private key
    fn sign(&self, message: &[u8], key: &SecretKey) -> Vec<u8>;

    /// Check a detached signature of `message` against the announced public key
    fn verify(&self, message: &[u8], signature: &[u8], key: &PublicKey) -> bool;
}

/// The stock [`ChallengeCrypto`]: Ed25519 detached signatures
///
/// Signing and verification are constant-time in the key material by
/// construction of the underlying dalek implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Challenge;

impl ChallengeCrypto for Ed25519Challenge {
    fn sign(&self, message: &[u8], key: &SecretKey) -> Vec<u8> {
        key.sign(message).to_vec()
    }

    fn verify(&self, message: &[u8], signature: &[u8], key: &PublicKey) -> bool {
        key.verify(message, signature)
    }
}
