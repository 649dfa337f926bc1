//! Length-prefixed chunk framing
//!
//! Both the handshake and the framed RPC protocol move discrete records over
//! an ordered byte stream as chunks: a 4-byte big-endian length followed by
//! that many payload bytes. A public key record is a chunk whose payload is
//! the key's canonical 32-byte encoding.
//!
//! Reads come in two flavors: unbounded (the serving loop, which blocks until
//! the peer speaks or hangs up) and deadline-bounded (the handshake, which
//! works against a single decrementing timeout budget).

use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::crypto::{KeyError, PublicKey};

/// Largest chunk either side will accept; anything bigger moves out of band
pub const MAX_CHUNK_LEN: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The deadline elapsed before the peer produced the record
    #[error("timed out waiting for peer data")]
    Timeout,
    #[error("chunk length {0} exceeds the cap of {max} bytes", max = MAX_CHUNK_LEN)]
    ChunkTooLarge(usize),
    /// A key record arrived but its payload is not a usable public key
    #[error(transparent)]
    InvalidKey(#[from] KeyError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remaining portion of a single timeout budget
///
/// Constructed once at the start of a multi-step exchange; every bounded read
/// consumes whatever wall-clock time it took. An expired deadline fails the
/// next read immediately rather than polling the stream again.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    end: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            end: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

/// Write one length-prefixed chunk
pub async fn write_chunk<W>(writer: &mut W, payload: &[u8]) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_CHUNK_LEN {
        return Err(WireError::ChunkTooLarge(payload.len()));
    }
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed chunk, blocking until the peer delivers it
pub async fn read_chunk<R>(reader: &mut R) -> Result<Vec<u8>, WireError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_CHUNK_LEN {
        return Err(WireError::ChunkTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Read one chunk under the remaining timeout budget
pub async fn read_chunk_deadline<R>(
    reader: &mut R,
    deadline: &Deadline,
) -> Result<Vec<u8>, WireError>
where
    R: AsyncRead + Unpin,
{
    if deadline.expired() {
        return Err(WireError::Timeout);
    }
    match tokio::time::timeout(deadline.remaining(), read_chunk(reader)).await {
        Ok(result) => result,
        Err(_) => Err(WireError::Timeout),
    }
}

/// Write a public key record
pub async fn write_public_key<W>(writer: &mut W, key: &PublicKey) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    write_chunk(writer, &key.to_bytes()).await
}

/// Read a public key record under the remaining timeout budget
pub async fn read_public_key_deadline<R>(
    reader: &mut R,
    deadline: &Deadline,
) -> Result<PublicKey, WireError>
where
    R: AsyncRead + Unpin,
{
    let bytes = read_chunk_deadline(reader, deadline).await?;
    Ok(PublicKey::try_from(bytes.as_slice())?)
}
