use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{ops, Bucket};
use crate::encoding::{Hash, Manifest};
use crate::protocol::{Bincode, Decode, Encode};
use crate::wire::{read_chunk, write_chunk, WireError};

/// Serve a bucket's operations to the peer on `stream`
///
/// The local half of a networked bucket: reads request frames
/// (`[correlation][name chunk][payload chunk]`), dispatches each by
/// operation name, and writes the matching response frame. Requests are
/// handled on their own tasks so a slow operation doesn't head-of-line
/// block the connection; the writer is shared behind a lock.
///
/// Run this only on a stream whose peer already passed the authentication
/// handshake. Returns when the peer hangs up; an `Err` is a transport
/// fault, not an application one.
pub async fn serve_bucket<S, B>(stream: S, bucket: Arc<B>) -> Result<(), WireError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    B: Bucket + 'static,
{
    let (mut reader, writer) = tokio::io::split(stream);
    let writer = Arc::new(tokio::sync::Mutex::new(writer));

    loop {
        let correlation = match reader.read_u64().await {
            Ok(correlation) => correlation,
            // normal end of the connection
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let name = read_chunk(&mut reader).await?;
        let payload = read_chunk(&mut reader).await?;

        let bucket = bucket.clone();
        let writer = writer.clone();
        tokio::spawn(async move {
            let name = String::from_utf8_lossy(&name).into_owned();
            let Some(response) = dispatch(bucket.as_ref(), &name, &payload).await else {
                return;
            };
            let mut writer = writer.lock().await;
            let written: Result<(), WireError> = async {
                writer.write_u64(correlation).await?;
                write_chunk(&mut *writer, &response).await?;
                Ok(())
            }
            .await;
            if let Err(e) = written {
                tracing::debug!(correlation, "failed to write response: {}", e);
            }
        });
    }
}

/// Route one named call to the bucket and encode its result
///
/// `None` means no reply goes out — an unknown operation or an undecodable
/// argument; the caller's own invocation timeout will fire. Operation
/// failures on the bucket itself are also logged and dropped rather than
/// crashing the serving loop.
async fn dispatch<B: Bucket>(bucket: &B, name: &str, payload: &[u8]) -> Option<Vec<u8>> {
    let result = match name {
        ops::GET_CURRENT_SIZE => encode_result(bucket.current_size().await),
        ops::GET_MAX_SIZE => encode_result(bucket.max_size().await),
        ops::GET_OWNER_IDENTITY => encode_result(bucket.owner_identity().await),
        ops::GET_POOL_IDENTITY => encode_result(bucket.pool_identity().await),
        ops::GET_SELF_IDENTITY => encode_result(bucket.self_identity().await),
        ops::GET_MANIFESTS => encode_result(bucket.manifests().await),
        ops::GET_HASHES => {
            let manifest: Manifest = decode_argument(name, payload)?;
            encode_result(bucket.hashes(&manifest).await)
        }
        ops::GET_SLICES => {
            let (manifest, hashes): (Manifest, Vec<Hash>) = decode_argument(name, payload)?;
            encode_result(bucket.slices(&manifest, &hashes).await)
        }
        unknown => {
            tracing::warn!(operation = unknown, "ignoring unknown operation");
            return None;
        }
    };

    match result {
        Ok(response) => Some(response),
        Err(reason) => {
            tracing::warn!(operation = name, "dropping request: {}", reason);
            None
        }
    }
}

fn decode_argument<T: serde::de::DeserializeOwned>(name: &str, payload: &[u8]) -> Option<T> {
    match Bincode.decode(payload) {
        Ok(argument) => Some(argument),
        Err(e) => {
            tracing::warn!(operation = name, "undecodable argument: {}", e);
            None
        }
    }
}

fn encode_result<T: serde::Serialize>(
    result: Result<T, super::BucketError>,
) -> Result<Vec<u8>, String> {
    let value = result.map_err(|e| e.to_string())?;
    Bincode.encode(&value).map_err(|e| e.to_string())
}
