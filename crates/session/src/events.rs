// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session events broadcast to the UI layer.

use serde::Serialize;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Explicit user logout.
    UserLogout,
    /// Silent logout: refresh rejected, refresh failed, or unusable stored state.
    Expired,
}

/// Events emitted by the refresh coordinator.
///
/// `Ended` fires once per session, when it actually transitions to
/// unauthenticated; the UI redirects to login on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn { user_id: String },
    Restored { user_id: String },
    /// A new access token is in place.
    Refreshed { expires_at_ms: u64 },
    /// A refresh attempt failed without ending the session.
    RefreshFailed { error: String },
    Ended { reason: EndReason },
}
