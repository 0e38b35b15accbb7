//! Configuration for the hub dashboard.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_core::{LinkConfig, PeerInfo, TcpConnector};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Satellites this hub may dial.
    pub network: NetworkConfig,
    /// Where the chosen satellite is remembered.
    pub storage: StorageConfig,
    /// Engine timing, transfer and mirroring settings.
    pub link: LinkConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// One dialable satellite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SatelliteEntry {
    /// `host:port` of the satellite's listener.
    pub address: String,
    /// Name shown in the dashboard and status strings.
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub satellites: Vec<SatelliteEntry>,
    /// Bound on one dial attempt.
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding the remembered satellite address.
    pub peer_file: PathBuf,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Log file. The dashboard owns the terminal, so logs never go to
    /// stderr.
    pub file: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            satellites: vec![SatelliteEntry {
                address: "127.0.0.1:7341".into(),
                name: "satellite".into(),
            }],
            connect_timeout_ms: 5_000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            peer_file: PathBuf::from("tether-hub.peer.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: PathBuf::from("tether-hub.log"),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl HubConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    pub fn candidates(&self) -> Vec<PeerInfo> {
        self.network
            .satellites
            .iter()
            .map(|s| PeerInfo::new(&s.address, &s.name))
            .collect()
    }

    pub fn connector(&self) -> TcpConnector {
        TcpConnector::new(
            self.candidates(),
            Duration::from_millis(self.network.connect_timeout_ms),
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────
