//! Client configuration

use serde::{Deserialize, Serialize};

/// Route of the token refresh endpoint, relative to `base_url`
pub const REFRESH_ROUTE: &str = "auth/refresh/";

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every relative route is joined to
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Where the client sends the user when the session cannot be refreshed
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

fn default_base_url() -> String { "http://127.0.0.1:8000/api".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_login_path() -> String { "/login".to_string() }

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            login_path: default_login_path(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Join a normalized route to the base URL
    pub fn url_for(&self, route: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), route)
    }
}
