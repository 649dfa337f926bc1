use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;

use super::{Correlation, Protocol, ProtocolError};
use crate::wire::{read_chunk, write_chunk, WireError};

/// Multiplexes named calls over one chunk-framed byte stream
///
/// Request frame: `[u64 correlation][name chunk][payload chunk]`.
/// Response frame: `[u64 correlation][payload chunk]`.
///
/// A background task reads response frames and completes the matching
/// in-flight call. Responses whose call already timed out (or that were
/// never asked for) are discarded; a timed-out correlation is never matched
/// to a newer call. When the stream ends, every in-flight and future call
/// fails with [`ProtocolError::Closed`].
///
/// Cheap to clone; clones share the connection. Safe to invoke concurrently
/// from multiple tasks.
#[derive(Clone)]
pub struct FramedProtocol {
    writer: Arc<tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>>,
    pending: Arc<Mutex<Pending>>,
    next_correlation: Arc<AtomicU64>,
}

#[derive(Default)]
struct Pending {
    /// completed by the reader task when the response frame arrives
    responders: HashMap<Correlation, oneshot::Sender<Vec<u8>>>,
    /// claimed by `await_response`
    receivers: HashMap<Correlation, oneshot::Receiver<Vec<u8>>>,
    closed: bool,
}

impl FramedProtocol {
    /// Take over a connected, already-authenticated stream
    pub fn connect<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let pending = Arc::new(Mutex::new(Pending::default()));
        tokio::spawn(read_loop(reader, pending.clone()));
        Self {
            writer: Arc::new(tokio::sync::Mutex::new(Box::new(writer))),
            pending,
            next_correlation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn read_loop<R>(mut reader: R, pending: Arc<Mutex<Pending>>)
where
    R: AsyncRead + Unpin,
{
    loop {
        let correlation = match reader.read_u64().await {
            Ok(correlation) => correlation,
            Err(_) => break,
        };
        let payload = match read_chunk(&mut reader).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("response stream ended: {}", e);
                break;
            }
        };
        let responder = pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .responders
            .remove(&correlation);
        match responder {
            Some(tx) => {
                // receiver may have timed out between removal and send
                let _ = tx.send(payload);
            }
            None => {
                tracing::debug!(correlation, "discarding response with no waiting call");
            }
        }
    }

    let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
    pending.closed = true;
    // dropping the senders wakes every claimed receiver with a recv error
    pending.responders.clear();
    pending.receivers.clear();
}

#[async_trait::async_trait]
impl Protocol for FramedProtocol {
    async fn send_call(
        &self,
        method: &str,
        payload: Vec<u8>,
    ) -> Result<Correlation, ProtocolError> {
        let correlation = self.next_correlation.fetch_add(1, Ordering::Relaxed);

        // register before writing so a fast response can't race registration
        {
            let mut pending = self.pending();
            if pending.closed {
                return Err(ProtocolError::Closed);
            }
            let (tx, rx) = oneshot::channel();
            pending.responders.insert(correlation, tx);
            pending.receivers.insert(correlation, rx);
        }

        let mut writer = self.writer.lock().await;
        let written: Result<(), WireError> = async {
            writer.write_u64(correlation).await?;
            write_chunk(&mut *writer, method.as_bytes()).await?;
            write_chunk(&mut *writer, &payload).await?;
            Ok(())
        }
        .await;
        drop(writer);

        if let Err(e) = written {
            let mut pending = self.pending();
            pending.responders.remove(&correlation);
            pending.receivers.remove(&correlation);
            return Err(ProtocolError::Transport(e.to_string()));
        }

        tracing::trace!(correlation, method, "call sent");
        Ok(correlation)
    }

    async fn await_response(
        &self,
        correlation: Correlation,
        timeout: Duration,
    ) -> Result<Vec<u8>, ProtocolError> {
        let receiver = self.pending().receivers.remove(&correlation);
        let Some(receiver) = receiver else {
            if self.pending().closed {
                return Err(ProtocolError::Closed);
            }
            return Err(ProtocolError::Transport(format!(
                "no pending call for correlation {}",
                correlation
            )));
        };

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(ProtocolError::Closed),
            Err(_) => {
                // leave nothing behind: a response that straggles in later
                // is dropped by the reader, not handed to a newer call
                self.pending().responders.remove(&correlation);
                Err(ProtocolError::Timeout(timeout))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Echo server over the raw frame format, with an optional per-response
    /// delay to provoke client-side timeouts
    fn spawn_echo_server<S>(stream: S, delay: Option<Duration>)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        tokio::spawn(async move {
            let (mut reader, writer) = tokio::io::split(stream);
            let writer = Arc::new(tokio::sync::Mutex::new(writer));
            loop {
                let Ok(correlation) = reader.read_u64().await else {
                    break;
                };
                let Ok(_name) = read_chunk(&mut reader).await else {
                    break;
                };
                let Ok(payload) = read_chunk(&mut reader).await else {
                    break;
                };
                let writer = writer.clone();
                tokio::spawn(async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    let mut writer = writer.lock().await;
                    writer.write_u64(correlation).await.unwrap();
                    write_chunk(&mut *writer, &payload).await.unwrap();
                });
            }
        });
    }

    #[tokio::test]
    async fn test_call_response_round_trip() {
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        spawn_echo_server(server_end, None);
        let protocol = FramedProtocol::connect(client_end);

        let correlation = protocol
            .send_call("echo", b"payload".to_vec())
            .await
            .unwrap();
        let response = protocol
            .await_response(correlation, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response, b"payload");
    }

    #[tokio::test]
    async fn test_concurrent_calls_correlate() {
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        spawn_echo_server(server_end, None);
        let protocol = FramedProtocol::connect(client_end);

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let protocol = protocol.clone();
            handles.push(tokio::spawn(async move {
                let correlation = protocol.send_call("echo", vec![i; 4]).await.unwrap();
                let response = protocol
                    .await_response(correlation, Duration::from_secs(1))
                    .await
                    .unwrap();
                (i, response)
            }));
        }
        for handle in handles {
            let (i, response) = handle.await.unwrap();
            assert_eq!(response, vec![i; 4]);
        }
    }

    #[tokio::test]
    async fn test_timed_out_call_discards_late_response() {
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        spawn_echo_server(server_end, Some(Duration::from_millis(100)));
        let protocol = FramedProtocol::connect(client_end);

        let correlation = protocol.send_call("echo", b"stale".to_vec()).await.unwrap();
        assert!(matches!(
            protocol
                .await_response(correlation, Duration::from_millis(10))
                .await,
            Err(ProtocolError::Timeout(_))
        ));

        // the late response for the first call must not leak into this one
        tokio::time::sleep(Duration::from_millis(150)).await;
        let correlation = protocol.send_call("echo", b"fresh".to_vec()).await.unwrap();
        let response = protocol
            .await_response(correlation, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response, b"fresh");
    }

    #[tokio::test]
    async fn test_closed_connection_fails_pending_calls() {
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        let protocol = FramedProtocol::connect(client_end);

        let correlation = protocol.send_call("echo", vec![]).await.unwrap();
        drop(server_end);

        assert!(matches!(
            protocol
                .await_response(correlation, Duration::from_secs(1))
                .await,
            Err(ProtocolError::Closed)
        ));
    }
}
