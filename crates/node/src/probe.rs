use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use common::bucket::{Bucket, RemoteBucketFactory};
use common::crypto::Ed25519Challenge;
use common::encoding::Identity;
use common::handshake::{Handshake, HandshakeOutcome};
use common::protocol::FramedProtocol;
use serde::Serialize;
use tokio::net::TcpStream;

use crate::config::Config;

/// What a probe learned about a remote bucket
#[derive(Debug, Serialize)]
struct BucketReport {
    peer_identity: Identity,
    max_size: u64,
    current_size: u64,
    owner_identity: Identity,
    pool_identity: Identity,
    self_identity: Identity,
    manifests: Vec<ManifestReport>,
}

#[derive(Debug, Serialize)]
struct ManifestReport {
    id: String,
    length: u64,
    num_slices: u32,
    hashes_held: usize,
}

/// Connect to a peer, authenticate, and print its bucket inventory as JSON
pub async fn run(config: Config, addr: SocketAddr) -> Result<()> {
    let secret = config.secret_key()?;

    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let outcome = Handshake::new(Ed25519Challenge)
        .authenticate(&mut stream, &secret, config.handshake_timeout)
        .await?;
    let peer = match outcome {
        HandshakeOutcome::Authenticated(peer) => peer,
        HandshakeOutcome::Rejected => anyhow::bail!("peer failed challenge verification"),
        HandshakeOutcome::TimedOut => anyhow::bail!("handshake timed out"),
    };
    tracing::info!(peer = %Identity::from(&peer), "peer authenticated");

    let protocol = FramedProtocol::connect(stream);
    let remote = RemoteBucketFactory::bincode(config.response_timeout)
        .create_from(Arc::new(protocol));

    let mut manifests = Vec::new();
    for manifest in remote.manifests().await? {
        let hashes = remote.hashes(&manifest).await?;
        manifests.push(ManifestReport {
            id: manifest.id().to_string(),
            length: manifest.length(),
            num_slices: manifest.num_slices(),
            hashes_held: hashes.len(),
        });
    }

    let report = BucketReport {
        peer_identity: Identity::from(&peer),
        max_size: remote.max_size().await?,
        current_size: remote.current_size().await?,
        owner_identity: remote.owner_identity().await?,
        pool_identity: remote.pool_identity().await?,
        self_identity: remote.self_identity().await?,
        manifests,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
