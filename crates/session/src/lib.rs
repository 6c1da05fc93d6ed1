// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storefront session core: credential storage, proactive token refresh,
//! and transparent re-authentication for the storefront REST API.

pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod interceptor;
pub mod lifecycle;
pub mod session;
pub mod store;
pub mod timer;
pub mod token_api;

#[cfg(test)]
mod test_support;

use std::sync::Once;

pub use crate::client::{ApiClient, ApiResponse, InterceptorHandle};
pub use crate::config::SessionConfig;
pub use crate::coordinator::RefreshCoordinator;
pub use crate::error::{RefreshError, SessionError, StoreError};
pub use crate::events::{EndReason, SessionEvent};
pub use crate::interceptor::RequestDescriptor;
pub use crate::lifecycle::{spawn_foreground_watch, AppState};
pub use crate::session::{AuthState, Session, SessionState, UserProfile, UserUpdate};
pub use crate::store::{CredentialStore, EncryptedFileStore, MemoryStore};

static CRYPTO_PROVIDER: Once = Once::new();

/// Install the rustls crypto provider (needed for reqwest even on plain HTTP).
///
/// Safe to call repeatedly; every HTTP client constructor in this crate
/// calls it before building a `reqwest::Client`.
pub fn ensure_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
