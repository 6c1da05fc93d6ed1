// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token clock: pure expiry arithmetic over epoch milliseconds.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Token lifetime assumed when the server omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Margin before expiry at which a token counts as "expiring soon" (5 minutes).
pub const DEFAULT_REFRESH_BUFFER_MS: u64 = 300_000;

/// Return current epoch millis.
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Absolute expiry for a token issued at `now_ms` with the given lifetime.
pub fn compute_expiry(expires_in_secs: Option<u64>, now_ms: u64) -> u64 {
    let secs = expires_in_secs.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    now_ms.saturating_add(secs.saturating_mul(1000))
}

/// Parse a persisted `token_expiry` value. Unparseable text reads as absent.
pub fn parse_expiry(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

/// Whether a token expiring at `expiry_ms` needs refreshing now.
///
/// An unknown expiry always needs refreshing.
pub fn is_expiring_soon(expiry_ms: Option<u64>, now_ms: u64, buffer_ms: u64) -> bool {
    match expiry_ms {
        Some(expiry) => now_ms >= expiry.saturating_sub(buffer_ms),
        None => true,
    }
}

/// When the next proactive refresh should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPlan {
    /// Already inside the buffer window: refresh right away.
    Immediate,
    /// Refresh after this delay.
    After(Duration),
}

/// Plan the next refresh for a token expiring at `expiry_ms`.
pub fn plan_refresh(expiry_ms: u64, now_ms: u64, buffer_ms: u64) -> RefreshPlan {
    let refresh_at = expiry_ms.saturating_sub(buffer_ms);
    if now_ms < refresh_at {
        RefreshPlan::After(Duration::from_millis(refresh_at - now_ms))
    } else {
        RefreshPlan::Immediate
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
