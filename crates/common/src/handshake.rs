//! Mutual challenge-response authentication
//!
//! Two peers run this protocol symmetrically over any ordered, reliable byte
//! stream. Each side sends its public key and a fresh random challenge, then
//! proves possession of its private key by signing the XOR of both
//! challenges. Mixing both sides' randomness into the signed value binds the
//! proof to this session: a `(key, challenge, signature)` transcript captured
//! from an earlier session fails verification against a fresh peer nonce.
//!
//! The handshake authenticates endpoints and nothing more. It makes no claim
//! about confidentiality or forward secrecy of the traffic that follows;
//! encrypt the session separately if that matters.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::crypto::{ChallengeCrypto, PublicKey, SecretKey};
use crate::wire::{
    read_chunk_deadline, read_public_key_deadline, write_chunk, write_public_key, Deadline,
    WireError,
};

/// Challenge nonce length in bytes. 256 bits of CSPRNG output.
pub const CHALLENGE_LEN: usize = 32;

/// How an authentication attempt ended
///
/// Timeout and rejection are deliberate security outcomes, not transport
/// faults, so they live in the `Ok` position and every caller has to handle
/// all three cases. Whatever the outcome short of `Authenticated`, the
/// stream must be torn down, never used as a trusted channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// The peer proved possession of the private key matching this public key
    Authenticated(PublicKey),
    /// The peer's signature did not verify; treat as a security event
    Rejected,
    /// The peer went silent before the timeout budget ran out
    TimedOut,
}

#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The peer's challenge is not the same length as ours, which the
    /// protocol forbids
    #[error("challenge length mismatch: ours {ours}, theirs {theirs}")]
    ChallengeLengthMismatch { ours: usize, theirs: usize },
    #[error(transparent)]
    Wire(WireError),
}

/// Runs the mutual authentication protocol with a pluggable signature scheme
///
/// The four protocol steps are exposed individually so either side of a
/// custom transport can drive them; [`Handshake::authenticate`] composes them
/// into the full symmetric exchange under one timeout budget.
pub struct Handshake<C> {
    crypto: C,
}

impl<C: ChallengeCrypto> Handshake<C> {
    pub fn new(crypto: C) -> Self {
        Self { crypto }
    }

    /// Send our public key and our challenge
    pub async fn send_challenge<S>(
        &self,
        stream: &mut S,
        ours: &PublicKey,
        our_challenge: &[u8],
    ) -> Result<(), HandshakeError>
    where
        S: AsyncWrite + Unpin,
    {
        write_public_key(stream, ours).await.map_err(wire_fault)?;
        write_chunk(stream, our_challenge).await.map_err(wire_fault)
    }

    /// Receive their public key and their challenge under the budget
    ///
    /// `Ok(None)` means the peer went silent; any other failure is a
    /// transport or protocol fault.
    pub async fn receive_challenge<S>(
        &self,
        stream: &mut S,
        deadline: &Deadline,
    ) -> Result<Option<(PublicKey, Vec<u8>)>, HandshakeError>
    where
        S: AsyncRead + Unpin,
    {
        let theirs = match read_public_key_deadline(stream, deadline).await {
            Ok(key) => key,
            Err(WireError::Timeout) => return Ok(None),
            Err(e) => return Err(wire_fault(e)),
        };
        match read_chunk_deadline(stream, deadline).await {
            Ok(challenge) => Ok(Some((theirs, challenge))),
            Err(WireError::Timeout) => Ok(None),
            Err(e) => Err(wire_fault(e)),
        }
    }

    /// Send our proof: a signature over the XOR of both challenges
    pub async fn send_challenge_response<S>(
        &self,
        stream: &mut S,
        ours: &SecretKey,
        our_challenge: &[u8],
        their_challenge: &[u8],
    ) -> Result<(), HandshakeError>
    where
        S: AsyncWrite + Unpin,
    {
        let mixed = xor_mix(our_challenge, their_challenge)?;
        let proof = self.crypto.sign(&mixed, ours);
        write_chunk(stream, &proof).await.map_err(wire_fault)
    }

    /// Receive their proof and verify it against their announced key
    ///
    /// `Ok(Some(true))` is a valid proof, `Ok(Some(false))` a rejected one,
    /// `Ok(None)` a silent peer.
    pub async fn receive_challenge_response<S>(
        &self,
        stream: &mut S,
        our_challenge: &[u8],
        their_challenge: &[u8],
        theirs: &PublicKey,
        deadline: &Deadline,
    ) -> Result<Option<bool>, HandshakeError>
    where
        S: AsyncRead + Unpin,
    {
        let proof = match read_chunk_deadline(stream, deadline).await {
            Ok(proof) => proof,
            Err(WireError::Timeout) => return Ok(None),
            Err(e) => return Err(wire_fault(e)),
        };
        let mixed = xor_mix(our_challenge, their_challenge)?;
        Ok(Some(self.crypto.verify(&mixed, &proof, theirs)))
    }

    /// Run the full symmetric exchange against the peer on `stream`
    ///
    /// Generates a fresh challenge, trades keys and challenges, trades
    /// proofs, and verifies. The whole exchange shares one `timeout` budget;
    /// time spent waiting for the peer's challenge is no longer available
    /// when waiting for its proof.
    pub async fn authenticate<S>(
        &self,
        stream: &mut S,
        ours: &SecretKey,
        timeout: Duration,
    ) -> Result<HandshakeOutcome, HandshakeError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let our_challenge = fresh_challenge();
        let deadline = Deadline::after(timeout);

        self.send_challenge(stream, &ours.public(), &our_challenge)
            .await?;

        let Some((theirs, their_challenge)) = self.receive_challenge(stream, &deadline).await?
        else {
            tracing::debug!("peer sent no challenge within budget");
            return Ok(HandshakeOutcome::TimedOut);
        };
        if their_challenge.len() != our_challenge.len() {
            return Err(HandshakeError::ChallengeLengthMismatch {
                ours: our_challenge.len(),
                theirs: their_challenge.len(),
            });
        }

        self.send_challenge_response(stream, ours, &our_challenge, &their_challenge)
            .await?;

        match self
            .receive_challenge_response(stream, &our_challenge, &their_challenge, &theirs, &deadline)
            .await?
        {
            Some(true) => {
                tracing::debug!(peer = %theirs, "peer authenticated");
                Ok(HandshakeOutcome::Authenticated(theirs))
            }
            Some(false) => {
                tracing::warn!(peer = %theirs, "peer failed challenge verification");
                Ok(HandshakeOutcome::Rejected)
            }
            None => {
                tracing::debug!(peer = %theirs, "peer sent no proof within budget");
                Ok(HandshakeOutcome::TimedOut)
            }
        }
    }
}

/// Byte-wise XOR of two equal-length challenge buffers
fn xor_mix(ours: &[u8], theirs: &[u8]) -> Result<Vec<u8>, HandshakeError> {
    if ours.len() != theirs.len() {
        return Err(HandshakeError::ChallengeLengthMismatch {
            ours: ours.len(),
            theirs: theirs.len(),
        });
    }
    Ok(ours.iter().zip(theirs).map(|(a, b)| a ^ b).collect())
}

fn fresh_challenge() -> Vec<u8> {
    use rand::RngCore;
    let mut challenge = vec![0u8; CHALLENGE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut challenge);
    challenge
}

fn wire_fault(e: WireError) -> HandshakeError {
    HandshakeError::Wire(e)
}
