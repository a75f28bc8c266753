//! Client configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/filerelay/client.toml`
//! - Windows: `%APPDATA%/filerelay/client.toml`

use std::path::{Path, PathBuf};

use filerelay_protocol::constants::DEFAULT_SERVER_URL;
use serde::{Deserialize, Serialize};

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the relay.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Show sizes in binary units.
    #[serde(default)]
    pub iec_units: bool,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            iec_units: false,
        }
    }
}

impl Config {
    /// Loads configuration from the default location, creating it with
    /// defaults if missing.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    /// Loads configuration from `path`, creating it with defaults if
    /// missing.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Writes the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("filerelay").join("client.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("filerelay")
            .join("client.toml")
    }
}
