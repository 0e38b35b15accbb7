//! Configuration for the satellite service.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tether_core::{AppEntry, LinkConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SatelliteConfig {
    /// Listener settings.
    pub network: NetworkConfig,
    /// Engine timing and transfer settings.
    pub link: LinkConfig,
    /// Where device telemetry is read from.
    pub device: DeviceConfig,
    /// External commands run on behalf of the hub.
    pub actions: ActionsConfig,
    /// Applications advertised in response to an app-list request.
    pub apps: Vec<AppEntry>,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the link listener binds to.
    pub bind_addr: String,
}

/// Device telemetry sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// sysfs power-supply class directory.
    pub power_supply_dir: PathBuf,
    /// sysfs network class directory.
    pub net_dir: PathBuf,
    /// Wireless interface reported in telemetry.
    pub wifi_interface: String,
}

/// External commands. Each is an argv vector; an empty vector disables
/// the action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Run when the hub requests a shutdown.
    pub shutdown_command: Vec<String>,
    /// Tried when `shutdown_command` fails.
    pub shutdown_fallback_command: Vec<String>,
    /// Run with the artifact path appended once a file has been received.
    pub artifact_command: Vec<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:7341".into(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            power_supply_dir: PathBuf::from("/sys/class/power_supply"),
            net_dir: PathBuf::from("/sys/class/net"),
            wifi_interface: "wlan0".into(),
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            shutdown_command: vec!["systemctl".into(), "poweroff".into()],
            shutdown_fallback_command: vec!["poweroff".into()],
            artifact_command: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl SatelliteConfig {
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
}

// ── Tests ────────────────────────────────────────────────────────
