// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Calls to the backend's login and token-refresh endpoints.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::{RefreshError, SessionError};
use crate::session::UserProfile;

/// Body of a successful refresh. `access` is required; its absence is a failure.
#[derive(Debug, Clone, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// A new access token, plus a rotated refresh token if the server issued one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub access: String,
    pub refresh: Option<String>,
    pub expires_in: Option<u64>,
}

/// Body of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginGrant {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub must_change_password: bool,
    pub user: UserProfile,
}

/// HTTP client for the two auth endpoints.
pub struct TokenApi {
    http: reqwest::Client,
    login_url: String,
    refresh_url: String,
}

impl TokenApi {
    pub fn new(config: &SessionConfig) -> Self {
        crate::ensure_crypto_provider();
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        Self { http, login_url: config.login_url(), refresh_url: config.refresh_url() }
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// 401 and 403 mean the refresh token itself is no longer accepted.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, RefreshError> {
        let resp = self
            .http
            .post(&self.refresh_url)
            .json(&serde_json::json!({ "refresh": refresh_token }))
            .send()
            .await
            .map_err(|e| RefreshError::Transient(format!("HTTP error: {e}")))?;

        let status = resp.status();
        let body =
            resp.text().await.map_err(|e| RefreshError::Transient(format!("read body: {e}")))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RefreshError::Rejected(format!("HTTP {status}: {body}")));
        }
        if !status.is_success() {
            return Err(RefreshError::Transient(format!("HTTP {status}: {body}")));
        }

        let parsed: RefreshResponse = serde_json::from_str(&body)
            .map_err(|e| RefreshError::Transient(format!("parse response: {e}")))?;
        let access = parsed
            .access
            .filter(|a| !a.is_empty())
            .ok_or_else(|| RefreshError::Transient("response has no access token".into()))?;

        Ok(RefreshGrant { access, refresh: parsed.refresh, expires_in: parsed.expires_in })
    }

    /// Authenticate with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginGrant, SessionError> {
        let resp = self
            .http
            .post(&self.login_url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SessionError::Status { status, body });
        }

        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| SessionError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
#[path = "token_api_tests.rs"]
mod tests;
