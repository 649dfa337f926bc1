use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use common::bucket::{serve_bucket, MemoryBucket};
use common::crypto::{Ed25519Challenge, SecretKey};
use common::encoding::{generate_slices, Identity, Manifest};
use common::handshake::{Handshake, HandshakeOutcome};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::claims::IdentityClaimFactory;
use crate::config::{Config, DEFAULT_NUM_BLOCKS};

/// Serve this node's bucket until shutdown
///
/// Every accepted connection runs the mutual handshake first; peers that
/// time out or fail verification are dropped before a single bucket frame
/// is exchanged.
pub async fn run(config: Config, share: Vec<PathBuf>) -> Result<()> {
    let secret = config.secret_key()?;
    let self_identity = Identity::from(&secret.public());
    let pool_identity = config.pool_identity.unwrap_or(self_identity);
    let bucket = Arc::new(MemoryBucket::new(
        config.max_size,
        self_identity,
        pool_identity,
        self_identity,
    ));

    for path in share {
        share_file(&bucket, &path)?;
    }

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(
        addr = %config.listen_addr,
        identity = %self_identity,
        "serving bucket"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl+c");
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    loop {
        let (stream, peer_addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown_rx.changed() => break,
        };
        tracing::debug!(%peer_addr, "incoming connection");

        let bucket = bucket.clone();
        let secret = secret.clone();
        let timeout = config.handshake_timeout;
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, secret, timeout, bucket).await {
                tracing::warn!(%peer_addr, "connection ended with fault: {}", e);
            }
        });
    }

    tracing::info!("node shutdown complete");
    Ok(())
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    secret: SecretKey,
    timeout: std::time::Duration,
    bucket: Arc<MemoryBucket>,
) -> Result<()> {
    let outcome = Handshake::new(Ed25519Challenge)
        .authenticate(&mut stream, &secret, timeout)
        .await?;

    let peer = match outcome {
        HandshakeOutcome::Authenticated(peer) => peer,
        HandshakeOutcome::Rejected => {
            // a failed proof is a security event, not a transport blip
            tracing::warn!("rejecting peer: challenge verification failed");
            return Ok(());
        }
        HandshakeOutcome::TimedOut => {
            tracing::debug!("dropping peer: handshake timed out");
            return Ok(());
        }
    };

    let peer_identity = Identity::from(&peer);
    // the assertion a web session layer above this node would recognize
    let claim = IdentityClaimFactory.create_claim(&peer_identity.to_hex());
    tracing::info!(peer = %peer_identity, claim_type = claim.claim_type, "peer authenticated");

    serve_bucket(stream, bucket).await?;
    Ok(())
}

/// Register a file's contents as a stored object
fn share_file(bucket: &MemoryBucket, path: &PathBuf) -> Result<()> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    // a modest surplus over the block count keeps reconstruction easy
    let num_slices = (DEFAULT_NUM_BLOCKS * 3) as u32;
    let manifest = Manifest::describe(&data, num_slices);
    let slices = generate_slices(
        &data,
        DEFAULT_NUM_BLOCKS,
        num_slices as usize,
        &mut rand::rngs::OsRng,
    )?;

    if !bucket.try_add_manifest(manifest) {
        anyhow::bail!("manifest id collision for {}", path.display());
    }
    let mut stored = 0;
    for slice in slices {
        if bucket.try_add_slice(&manifest, slice) {
            stored += 1;
        }
    }
    tracing::info!(
        path = %path.display(),
        manifest = %manifest.id(),
        stored,
        "object registered"
    );
    Ok(())
}
