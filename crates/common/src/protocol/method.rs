use std::sync::Arc;
use std::time::Duration;

use super::codec::{CodecError, Decode, Encode};
use super::{Protocol, ProtocolError};

/// Side effect to run just before a call goes out, e.g. trace logging
pub type BeforeInvoke = Arc<dyn Fn() + Send + Sync>;

/// Why a single invocation failed
///
/// Each kind is distinct so callers can tell an encoding bug from a slow
/// peer. None of these poison the connection; only a transport-level
/// [`MethodError::Protocol`] failure does.
#[derive(Debug, thiserror::Error)]
pub enum MethodError {
    #[error("failed to encode argument: {0}")]
    Encode(CodecError),
    #[error("failed to decode result: {0}")]
    Decode(CodecError),
    /// The call did not complete in time. Not retried here: a retry could
    /// double-apply a non-idempotent remote effect.
    #[error("invocation timed out")]
    Timeout,
    #[error(transparent)]
    Protocol(ProtocolError),
}

/// One named remote operation with compile-time argument and result types
///
/// Hides the wire encoding behind an encoder/decoder pair injected at
/// construction; the same invocation mechanics serve every operation shape,
/// from zero-argument getters (argument type `()`) to tuple requests.
pub struct Method<Arg, Ret> {
    protocol: Arc<dyn Protocol>,
    name: &'static str,
    encoder: Arc<dyn Encode<Arg>>,
    decoder: Arc<dyn Decode<Ret>>,
    response_timeout: Duration,
    before_invoke: Option<BeforeInvoke>,
}

impl<Arg, Ret> Method<Arg, Ret> {
    pub fn new(
        protocol: Arc<dyn Protocol>,
        name: &'static str,
        encoder: Arc<dyn Encode<Arg>>,
        decoder: Arc<dyn Decode<Ret>>,
        response_timeout: Duration,
        before_invoke: Option<BeforeInvoke>,
    ) -> Self {
        Self {
            protocol,
            name,
            encoder,
            decoder,
            response_timeout,
            before_invoke,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Invoke the remote operation and wait for its typed result
    ///
    /// Serializes the argument, submits the named call, waits for the
    /// correlated response, deserializes. Every failure propagates; a bucket
    /// operation must never silently return a default.
    pub async fn invoke(&self, argument: &Arg) -> Result<Ret, MethodError> {
        if let Some(hook) = &self.before_invoke {
            hook();
        }

        let payload = self.encoder.encode(argument).map_err(MethodError::Encode)?;
        let correlation = self
            .protocol
            .send_call(self.name, payload)
            .await
            .map_err(protocol_fault)?;
        let response = self
            .protocol
            .await_response(correlation, self.response_timeout)
            .await
            .map_err(protocol_fault)?;
        self.decoder.decode(&response).map_err(MethodError::Decode)
    }
}

fn protocol_fault(e: ProtocolError) -> MethodError {
    match e {
        ProtocolError::Timeout(_) => MethodError::Timeout,
        other => MethodError::Protocol(other),
    }
}
