//! Silo Node - a runnable storage peer
//!
//! Serves a capacity-bounded bucket of erasure-coded slices over TCP.
//! Peers authenticate each other with a mutual challenge-response handshake
//! before any bucket operation crosses the wire.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

mod claims;
mod config;
mod probe;
mod serve;

use config::Config;

/// Silo Node - distributed storage peer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve this node's bucket to authenticated peers
    Serve {
        /// Address to listen on (overrides the config file)
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Register a file's contents as a stored object at startup
        #[arg(long)]
        share: Vec<PathBuf>,
    },
    /// Connect to a peer, authenticate, and print its bucket inventory
    Probe {
        /// Address of the peer to probe
        addr: SocketAddr,
    },
    /// Generate a node secret key and write it to a PEM file
    Keygen {
        /// Where to write the key
        #[arg(long, default_value = "secret.pem")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stderr());
    let log_level: tracing::Level = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stderr_layer).init();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.log_level = log_level;

    match args.command {
        Command::Serve { listen, share } => {
            if let Some(listen) = listen {
                config.listen_addr = listen;
            }
            serve::run(config, share).await
        }
        Command::Probe { addr } => probe::run(config, addr).await,
        Command::Keygen { output } => keygen(&output),
    }
}

fn keygen(output: &PathBuf) -> Result<()> {
    if output.exists() {
        anyhow::bail!("{} already exists, not overwriting", output.display());
    }
    let key = common::crypto::SecretKey::generate();
    std::fs::write(output, key.to_pem())?;
    println!("{}", key.public());
    tracing::info!(path = %output.display(), "wrote new secret key");
    Ok(())
}
