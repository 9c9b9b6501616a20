//! Server configuration.
//!
//! Env-var driven with directory defaults under `~/.sesctl`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use sesctl_core::{ExpiryPolicy, NetworkEndpoint};

/// Which session store backs this deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl StoreBackend {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "memory" => Some(StoreBackend::Memory),
            "sqlite" => Some(StoreBackend::Sqlite),
            _ => None,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP listen address
    pub listen_addr: SocketAddr,
    /// Session store backend
    pub backend: StoreBackend,
    /// Database path (sqlite backend only)
    pub database_path: PathBuf,
    /// Inactivity threshold after which a session is expired
    pub session_timeout: Duration,
    /// Interval between sweep passes
    pub sweep_interval: Duration,
    /// Outward-facing attribution of the serving host, captured on every
    /// created session. Interface discovery is out of scope; the values come
    /// from deployment configuration.
    pub server_endpoint: NetworkEndpoint,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 3500)),
            backend: StoreBackend::Memory,
            database_path: home.join(".sesctl").join("sessions.db"),
            session_timeout: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(60),
            server_endpoint: NetworkEndpoint {
                ip: "127.0.0.1".to_string(),
                mac_address: "00:00:00:00:00:00".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `SESCTL_LISTEN` — listen address (`host:port`)
    /// - `SESCTL_BACKEND` — `memory` or `sqlite`
    /// - `SESCTL_DATABASE_PATH` — sqlite file location
    /// - `SESCTL_SESSION_TIMEOUT_SECS` — inactivity threshold
    /// - `SESCTL_SWEEP_INTERVAL_SECS` — sweep cadence
    /// - `SESCTL_SERVER_IP` / `SESCTL_SERVER_MAC` — server attribution
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("SESCTL_LISTEN") {
            config.listen_addr = addr
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid SESCTL_LISTEN address: {addr}"))?;
        }
        if let Ok(backend) = std::env::var("SESCTL_BACKEND") {
            config.backend = StoreBackend::parse(&backend)
                .ok_or_else(|| anyhow::anyhow!("Invalid SESCTL_BACKEND: {backend}"))?;
        }
        if let Ok(path) = std::env::var("SESCTL_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Ok(secs) = std::env::var("SESCTL_SESSION_TIMEOUT_SECS") {
            config.session_timeout = Duration::from_secs(secs.parse()?);
        }
        if let Ok(secs) = std::env::var("SESCTL_SWEEP_INTERVAL_SECS") {
            config.sweep_interval = Duration::from_secs(secs.parse()?);
        }
        if let Ok(ip) = std::env::var("SESCTL_SERVER_IP") {
            config.server_endpoint.ip = ip;
        }
        if let Ok(mac) = std::env::var("SESCTL_SERVER_MAC") {
            config.server_endpoint.mac_address = mac;
        }

        if config.backend == StoreBackend::Sqlite {
            if let Some(parent) = config.database_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(config)
    }

    /// Expiry policy matching the backend: the volatile store hard-deletes,
    /// the durable store flips status to `Expired`. One deployment, one
    /// policy.
    pub fn expiry_policy(&self) -> ExpiryPolicy {
        match self.backend {
            StoreBackend::Memory => ExpiryPolicy::Delete,
            StoreBackend::Sqlite => ExpiryPolicy::MarkExpired,
        }
    }
}
