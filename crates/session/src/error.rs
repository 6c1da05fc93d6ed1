// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use reqwest::StatusCode;

/// Failures of the secure credential store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credential store I/O: {0}")]
    Io(#[from] std::io::Error),
    /// Decrypted contents did not deserialize.
    #[error("credential store corrupt: {0}")]
    Corrupt(String),
    /// Sealing or opening failed (wrong key or tampered file).
    #[error("credential store decryption failed")]
    Crypto,
    /// The encryption key is malformed.
    #[error("invalid store key: {0}")]
    Key(String),
    /// Backend refused the operation.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

/// Why a single refresh attempt did not produce a new access token.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token stored")]
    MissingToken,
    /// The server rejected the refresh token itself; the session is over.
    #[error("refresh token rejected: {0}")]
    Rejected(String),
    /// Network failure, server error, malformed body, or storage failure.
    #[error("{0}")]
    Transient(String),
    /// The session was logged out or replaced while the refresh ran.
    #[error("session changed during refresh")]
    Superseded,
}

impl RefreshError {
    /// Only a rejected refresh token ends the session implicitly.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

impl From<StoreError> for RefreshError {
    fn from(e: StoreError) -> Self {
        Self::Transient(e.to_string())
    }
}

/// Errors surfaced to the UI layer and to callers of [`ApiClient`](crate::ApiClient).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Uniform failure for every request waiting on a refresh that failed.
    #[error("session expired, please log in again")]
    SessionExpired,
    #[error("not authenticated")]
    Unauthenticated,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-success response delivered as-is.
    #[error("request failed ({status}): {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl SessionError {
    /// HTTP status of a propagated response error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
