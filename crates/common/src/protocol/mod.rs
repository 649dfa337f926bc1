//! Typed remote procedure calls
//!
//! A [`Method`] turns one named remote operation into a typed, awaitable
//! call; the [`Protocol`] trait is the seam to whatever moves the named call
//! and correlates its response. [`FramedProtocol`] is the stock
//! implementation, multiplexing calls over a single chunk-framed stream.

mod codec;
mod framed;
mod method;

pub use codec::{Bincode, CodecError, Decode, Encode};
pub use framed::FramedProtocol;
pub use method::{BeforeInvoke, Method, MethodError};

use std::time::Duration;

use async_trait::async_trait;

/// Identifies one in-flight call on a connection
pub type Correlation = u64;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// No correlated response arrived in time. The underlying request may
    /// still complete later; its response is discarded, never matched to a
    /// newer call.
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// The connection is gone; no further calls will succeed on it
    #[error("connection closed")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Moves named calls to a peer and correlates their responses
///
/// Implementations must keep call/response correlation intact under
/// concurrent calls from multiple tasks; the RPC layer on top assumes it can
/// issue different operations on one connection simultaneously.
#[async_trait]
pub trait Protocol: Send + Sync {
    /// Submit a named call; returns the correlation to wait on
    async fn send_call(&self, method: &str, payload: Vec<u8>)
        -> Result<Correlation, ProtocolError>;

    /// Wait for the response correlated to an earlier call
    async fn await_response(
        &self,
        correlation: Correlation,
        timeout: Duration,
    ) -> Result<Vec<u8>, ProtocolError>;
}
