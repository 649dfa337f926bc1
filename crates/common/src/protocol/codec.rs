use serde::{de::DeserializeOwned, Serialize};

/// A payload failed to cross the byte boundary
///
/// Fatal to the single call that carried it, not to the connection.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Encodes one argument type to wire bytes
///
/// Together with [`Decode`], this is the only operation-specific code in the
/// RPC layer: a method is a name plus one encoder and one decoder. Supplied
/// explicitly at construction rather than resolved by reflection.
pub trait Encode<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError>;
}

/// Decodes one result type from wire bytes
pub trait Decode<T>: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// The stock codec: bincode over serde
///
/// Covers every payload shape the bucket operations need, including the
/// unit argument `()` of the zero-argument getters (which encodes to an
/// empty payload).
#[derive(Debug, Clone, Copy, Default)]
pub struct Bincode;

impl<T: Serialize> Encode<T> for Bincode {
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
    }
}

impl<T: DeserializeOwned> Decode<T> for Bincode {
    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unit_encodes_empty() {
        let bytes = Bincode.encode(&()).unwrap();
        assert!(bytes.is_empty());
        let _: () = Bincode.decode(&bytes).unwrap();
    }

    #[test]
    fn test_round_trip() {
        let value = (42u64, vec!["a".to_string(), "b".to_string()]);
        let bytes = Bincode.encode(&value).unwrap();
        let back: (u64, Vec<String>) = Bincode.decode(&bytes).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_decode_failure_is_distinct() {
        let result: Result<u64, _> = Bincode.decode(&[0x01]);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }
}
