//! CLI configuration

use std::path::{Path, PathBuf};

use paydesk_client::ClientConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ClientConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// File the session (user, access token, refresh token) is kept in
    #[serde(default = "default_session_file")]
    pub file: PathBuf,
}

fn default_session_file() -> PathBuf { PathBuf::from(".paydesk/session.json") }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: default_session_file(),
        }
    }
}

impl Config {
    /// Read `path`, or fall back to defaults when it does not exist
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            info!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }
}
