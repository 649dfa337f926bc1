use std::fmt;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Size of an Ed25519 private key in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of an Ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Size of an Ed25519 detached signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The supplied key material does not describe a usable key.
    /// Surfaced immediately and never retried.
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Public key announcing a peer's identity
///
/// A thin wrapper around an Ed25519 verifying key. This key serves two purposes:
/// - **Peer identity**: a peer is known to others by this key, and the storage
///   [`Identity`](crate::encoding::Identity) roles are derived from it
/// - **Challenge verification**: proves the peer holds the matching private key
///   during the authentication handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(VerifyingKey);

impl From<VerifyingKey> for PublicKey {
    fn from(key: VerifyingKey) -> Self {
        PublicKey(key)
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = KeyError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(KeyError::InvalidKey(format!(
                "expected {} bytes, got {}",
                PUBLIC_KEY_SIZE,
                bytes.len()
            )));
        }
        let mut buff = [0; PUBLIC_KEY_SIZE];
        buff.copy_from_slice(bytes);
        let key = VerifyingKey::from_bytes(&buff)
            .map_err(|_| KeyError::InvalidKey("bytes are not a curve point".to_string()))?;
        Ok(PublicKey(key))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl PublicKey {
    /// Parse a public key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; PUBLIC_KEY_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| KeyError::InvalidKey("public key hex decode error".to_string()))?;
        PublicKey::try_from(&buff[..])
    }

    /// Convert public key to raw bytes
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Convert public key to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verify an Ed25519 signature on a message
    ///
    /// Returns `false` for a signature of the wrong shape or one that does
    /// not match; never errors.
    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
            return false;
        };
        self.0.verify(msg, &signature).is_ok()
    }
}

/// Secret key backing a peer's identity
///
/// The private half of an Ed25519 keypair. Keep it off the wire; persist it
/// with [`SecretKey::to_pem`] (e.g. `~/.config/silo/secret.pem`).
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl From<[u8; PRIVATE_KEY_SIZE]> for SecretKey {
    fn from(secret: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(SigningKey::from_bytes(&secret))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // only the public half; secret bytes stay out of logs
        write!(f, "SecretKey({})", self.public())
    }
}

impl SecretKey {
    /// Parse a secret key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut buff = [0; PRIVATE_KEY_SIZE];
        hex::decode_to_slice(hex, &mut buff)
            .map_err(|_| KeyError::InvalidKey("private key hex decode error".to_string()))?;
        Ok(Self::from(buff))
    }

    /// Generate a new random secret key using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        getrandom::getrandom(&mut bytes).expect("failed to generate random bytes");
        Self::from(bytes)
    }

    /// Derive the public key from this secret key
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Convert secret key to raw bytes
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Encode secret key in PEM format for storage
    ///
    /// Returns a PEM-encoded string with tag "PRIVATE KEY".
    pub fn to_pem(&self) -> String {
        let pem = pem::Pem::new("PRIVATE KEY", self.to_bytes().to_vec());
        pem::encode(&pem)
    }

    /// Parse a secret key from PEM format
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The PEM string is malformed
    /// - The PEM tag is not "PRIVATE KEY"
    /// - The key size is incorrect
    pub fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(pem_str)
            .map_err(|e| KeyError::InvalidKey(format!("failed to parse PEM: {}", e)))?;

        if pem.tag() != "PRIVATE KEY" {
            return Err(KeyError::InvalidKey(
                "invalid PEM tag, expected PRIVATE KEY".to_string(),
            ));
        }

        let contents = pem.contents();
        if contents.len() != PRIVATE_KEY_SIZE {
            return Err(KeyError::InvalidKey(format!(
                "invalid private key size in PEM, expected {}, got {}",
                PRIVATE_KEY_SIZE,
                contents.len()
            )));
        }

        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        bytes.copy_from_slice(contents);
        Ok(Self::from(bytes))
    }

    /// Sign a message with this secret key using Ed25519
    ///
    /// Returns a detached signature that can be verified with the
    /// corresponding public key.
    pub fn sign(&self, msg: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.0.sign(msg).to_bytes()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let private_key = SecretKey::generate();
        let public_key = private_key.public();

        let private_hex = hex::encode(private_key.to_bytes());
        let recovered_private = SecretKey::from_hex(&private_hex).unwrap();
        assert_eq!(private_key.to_bytes(), recovered_private.to_bytes());

        let public_hex = public_key.to_hex();
        let recovered_public = PublicKey::from_hex(&public_hex).unwrap();
        assert_eq!(public_key.to_bytes(), recovered_public.to_bytes());
    }

    #[test]
    fn test_pem_serialization() {
        let private_key = SecretKey::generate();

        let pem = private_key.to_pem();
        let recovered_private = SecretKey::from_pem(&pem).unwrap();
        assert_eq!(private_key.to_bytes(), recovered_private.to_bytes());

        assert_eq!(
            private_key.public().to_bytes(),
            recovered_private.public().to_bytes()
        );
    }

    #[test]
    fn test_sign_and_verify() {
        let secret_key = SecretKey::generate();
        let public_key = secret_key.public();
        let message = b"hello, world!";

        let signature = secret_key.sign(message);
        assert!(public_key.verify(message, &signature));

        // wrong message
        assert!(!public_key.verify(b"hello, world?", &signature));

        // wrong key
        let other_key = SecretKey::generate().public();
        assert!(!other_key.verify(message, &signature));

        // mangled signature shape
        assert!(!public_key.verify(message, &signature[..32]));
    }

    #[test]
    fn test_rejects_malformed_key_material() {
        assert!(matches!(
            PublicKey::try_from(&[0u8; 16][..]),
            Err(KeyError::InvalidKey(_))
        ));
        assert!(matches!(
            SecretKey::from_pem("not a pem"),
            Err(KeyError::InvalidKey(_))
        ));
    }
}
