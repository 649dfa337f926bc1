mod challenge;
mod keys;

pub use challenge::{ChallengeCrypto, Ed25519Challenge};
pub use keys::{KeyError, PublicKey, SecretKey, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
