use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::crypto::SecretKey;
use common::encoding::Identity;
use serde::Deserialize;

/// Default number of source blocks an object is split into when shared
pub const DEFAULT_NUM_BLOCKS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {err}", path = .0.display(), err = .1)]
    Io(PathBuf, std::io::Error),
    #[error("failed to parse {path}: {err}", path = .0.display(), err = .1)]
    Parse(PathBuf, toml::de::Error),
    #[error("bad secret key at {path}: {err}", path = .0.display(), err = .1)]
    Secret(PathBuf, common::crypto::KeyError),
    #[error("pool identity must be 64 hex characters")]
    BadPoolIdentity,
}

/// Node configuration
///
/// Values come from an optional TOML file, overridden per-run by CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    /// address this node's bucket is served on
    pub listen_addr: SocketAddr,
    /// on-disk path to our secret, generated on first use if absent
    pub secret_path: Option<PathBuf>,
    /// capacity ceiling of the served bucket, in bytes
    pub max_size: u64,
    /// the pool this bucket participates in;
    ///  defaults to our own identity (a pool of one)
    pub pool_identity: Option<Identity>,
    /// budget for the authentication handshake
    pub handshake_timeout: Duration,
    /// how long a remote invocation waits for its response
    pub response_timeout: Duration,
    pub log_level: tracing::Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 4410),
            secret_path: None,
            max_size: 256 * 1024 * 1024,
            pool_identity: None,
            handshake_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(10),
            log_level: tracing::Level::INFO,
        }
    }
}

/// The subset of [`Config`] that can live in the TOML file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    listen_addr: Option<SocketAddr>,
    secret_path: Option<PathBuf>,
    max_size: Option<u64>,
    pool_identity: Option<String>,
    handshake_timeout_ms: Option<u64>,
    response_timeout_ms: Option<u64>,
}

impl Config {
    /// Load a config file over the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let file: ConfigFile =
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;

        let mut config = Config::default();
        if let Some(listen_addr) = file.listen_addr {
            config.listen_addr = listen_addr;
        }
        config.secret_path = file.secret_path;
        if let Some(max_size) = file.max_size {
            config.max_size = max_size;
        }
        if let Some(pool) = file.pool_identity {
            config.pool_identity = Some(parse_pool_identity(&pool)?);
        }
        if let Some(ms) = file.handshake_timeout_ms {
            config.handshake_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.response_timeout_ms {
            config.response_timeout = Duration::from_millis(ms);
        }
        Ok(config)
    }

    /// Load the secret key from `secret_path`, generating and persisting a
    /// fresh one on first use; without a path, an ephemeral key per run
    pub fn secret_key(&self) -> Result<SecretKey, ConfigError> {
        let Some(path) = &self.secret_path else {
            tracing::warn!("no secret_path configured, using an ephemeral identity");
            return Ok(SecretKey::generate());
        };
        if path.exists() {
            let pem = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Io(path.clone(), e))?;
            return SecretKey::from_pem(&pem).map_err(|e| ConfigError::Secret(path.clone(), e));
        }

        let key = SecretKey::generate();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(path.clone(), e))?;
        }
        std::fs::write(path, key.to_pem()).map_err(|e| ConfigError::Io(path.clone(), e))?;
        tracing::info!(path = %path.display(), "generated new node secret");
        Ok(key)
    }
}

fn parse_pool_identity(hex_str: &str) -> Result<Identity, ConfigError> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(hex_str, &mut bytes).map_err(|_| ConfigError::BadPoolIdentity)?;
    Ok(Identity::from_bytes(bytes))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr.port(), 4410);
        assert!(config.pool_identity.is_none());
    }

    #[test]
    fn test_load_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silo.toml");
        std::fs::write(
            &path,
            r#"
listen_addr = "127.0.0.1:9000"
max_size = 1024
handshake_timeout_ms = 250
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.max_size, 1024);
        assert_eq!(config.handshake_timeout, Duration::from_millis(250));
        // untouched fields keep their defaults
        assert_eq!(config.response_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_secret_key_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            secret_path: Some(dir.path().join("secret.pem")),
            ..Config::default()
        };

        let first = config.secret_key().unwrap();
        let second = config.secret_key().unwrap();
        assert_eq!(first.to_bytes(), second.to_bytes());
    }
}
