// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use crate::clock::{DEFAULT_EXPIRES_IN_SECS, DEFAULT_REFRESH_BUFFER_MS};

/// Configuration for the storefront session core.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionConfig {
    /// Base URL of the storefront REST API.
    #[arg(long, default_value = "http://127.0.0.1:8000/api", env = "STOREFRONT_API_URL")]
    pub api_url: String,

    /// Login endpoint path (never sent a bearer token).
    #[arg(long, default_value = "/auth/login/", env = "STOREFRONT_LOGIN_PATH")]
    pub login_path: String,

    /// Token refresh endpoint path (never sent a bearer token).
    #[arg(long, default_value = "/auth/token/refresh/", env = "STOREFRONT_REFRESH_PATH")]
    pub refresh_path: String,

    /// Refresh this many milliseconds before the access token expires.
    #[arg(long, default_value_t = DEFAULT_REFRESH_BUFFER_MS, env = "STOREFRONT_REFRESH_BUFFER_MS")]
    pub refresh_buffer_ms: u64,

    /// Token lifetime assumed when the server omits `expires_in`.
    #[arg(long, default_value_t = DEFAULT_EXPIRES_IN_SECS, env = "STOREFRONT_DEFAULT_EXPIRES_IN")]
    pub default_expires_in_secs: u64,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, default_value_t = 30, env = "STOREFRONT_REQUEST_TIMEOUT")]
    pub request_timeout_secs: u64,

    /// Encrypted credential file. Defaults to `<state dir>/credentials.bin`.
    #[arg(long, env = "STOREFRONT_STORE_PATH")]
    pub store_path: Option<PathBuf>,

    /// Base64-encoded 32-byte key for the credential file.
    #[arg(long, env = "STOREFRONT_STORE_KEY", hide_env_values = true)]
    pub store_key: Option<String>,
}

impl SessionConfig {
    /// Defaults for a backend at `api_url`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            login_path: "/auth/login/".to_owned(),
            refresh_path: "/auth/token/refresh/".to_owned(),
            refresh_buffer_ms: DEFAULT_REFRESH_BUFFER_MS,
            default_expires_in_secs: DEFAULT_EXPIRES_IN_SECS,
            request_timeout_secs: 30,
            store_path: None,
            store_key: None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Join an endpoint path onto the API base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), path)
    }

    pub fn login_url(&self) -> String {
        self.url(&self.login_path)
    }

    pub fn refresh_url(&self) -> String {
        self.url(&self.refresh_path)
    }

    /// Endpoints that must never carry a bearer token or trigger a refresh.
    pub fn auth_paths(&self) -> Vec<String> {
        vec![self.login_path.clone(), self.refresh_path.clone()]
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| state_dir().join("credentials.bin"))
    }
}

/// Resolve the state directory for session data.
///
/// Checks `STOREFRONT_STATE_DIR`, then `$XDG_STATE_HOME/storefront`,
/// then `$HOME/.local/state/storefront`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("STOREFRONT_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("storefront");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/storefront");
    }
    PathBuf::from(".storefront")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
