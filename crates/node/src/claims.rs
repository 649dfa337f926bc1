//! Identity assertions for a web-facing session layer
//!
//! The storage core authenticates peers by key possession and knows nothing
//! about web sessions. Whatever HTTP surface sits above a node can turn an
//! authenticated identity into a claim record here; nothing in `common`
//! depends on this module.

use serde::Serialize;

/// Claim type stamped on every identity assertion
pub const IDENTITY_CLAIM_TYPE: &str = "silo:identity";

/// An assertion that a session belongs to an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityClaim {
    pub claim_type: &'static str,
    pub value: String,
}

/// Creates identity claims for the session layer
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityClaimFactory;

impl IdentityClaimFactory {
    /// Assert the given raw identity
    pub fn create_claim(&self, identity: &str) -> IdentityClaim {
        IdentityClaim {
            claim_type: IDENTITY_CLAIM_TYPE,
            value: identity.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_claim_carries_the_identity() {
        let claim = IdentityClaimFactory.create_claim("deadbeef");
        assert_eq!(claim.claim_type, IDENTITY_CLAIM_TYPE);
        assert_eq!(claim.value, "deadbeef");
    }
}
