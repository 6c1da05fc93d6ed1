// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the storefront API with a pluggable auth interceptor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::SessionConfig;
use crate::coordinator::RefreshCoordinator;
use crate::error::SessionError;
use crate::interceptor::{authorize, mark_retried, on_response, RequestDescriptor, ResponseAction};

/// A delivered (2xx) response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, SessionError> {
        serde_json::from_slice(&self.body).map_err(|e| SessionError::InvalidResponse(e.to_string()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

struct Installed {
    id: u64,
    coordinator: Weak<RefreshCoordinator>,
}

type Slot = Arc<Mutex<Option<Installed>>>;

/// Registration of a coordinator on an [`ApiClient`]. [`dispose`](Self::dispose)
/// removes it; a later installation is left alone.
#[derive(Debug)]
pub struct InterceptorHandle {
    slot: Weak<Mutex<Option<Installed>>>,
    id: u64,
}

impl InterceptorHandle {
    pub fn dispose(&self) {
        let Some(slot) = self.slot.upgrade() else { return };
        let mut slot = slot.lock();
        if slot.as_ref().is_some_and(|i| i.id == self.id) {
            *slot = None;
        }
    }
}

/// Storefront API client.
///
/// Without an installed coordinator requests go out unauthenticated and a
/// 401 is returned as-is.
pub struct ApiClient {
    http: reqwest::Client,
    config: SessionConfig,
    auth_paths: Vec<String>,
    slot: Slot,
    next_id: AtomicU64,
}

impl ApiClient {
    pub fn new(config: &SessionConfig) -> Self {
        crate::ensure_crypto_provider();
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        Self {
            http,
            config: config.clone(),
            auth_paths: config.auth_paths(),
            slot: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Install the interceptor pair backed by `coordinator`, replacing any
    /// previous one.
    pub fn install(&self, coordinator: Weak<RefreshCoordinator>) -> InterceptorHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *self.slot.lock() = Some(Installed { id, coordinator });
        InterceptorHandle { slot: Arc::downgrade(&self.slot), id }
    }

    pub fn has_interceptor(&self) -> bool {
        self.coordinator().is_some()
    }

    fn coordinator(&self) -> Option<Arc<RefreshCoordinator>> {
        self.slot.lock().as_ref().and_then(|i| i.coordinator.upgrade())
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, SessionError> {
        self.send(RequestDescriptor::get(path)).await
    }

    /// Send a request through the interceptors.
    ///
    /// A first 401 triggers a (shared) token refresh and a single replay with
    /// the new token. A 401 for a token that has since been replaced replays
    /// with the stored one without refreshing again. If the refresh fails the
    /// session is ended and [`SessionError::SessionExpired`] returned.
    pub async fn send(&self, request: RequestDescriptor) -> Result<ApiResponse, SessionError> {
        let coordinator = self.coordinator();
        let token = match &coordinator {
            Some(c) => c.bearer_token().await?,
            None => None,
        };

        let outgoing = authorize(request, token.as_deref(), &self.auth_paths);
        let (status, headers, body) = self.execute(&outgoing).await?;

        match on_response(status, &outgoing, &self.auth_paths) {
            ResponseAction::Deliver => Ok(ApiResponse { status, headers, body }),
            ResponseAction::Propagate => Err(status_error(status, &body)),
            ResponseAction::RefreshAndRetry => {
                let Some(coordinator) = coordinator else {
                    return Err(status_error(status, &body));
                };
                let sent = outgoing.bearer().map(str::to_owned);
                let token = match coordinator.bearer_token().await? {
                    Some(stored) if sent.as_deref() != Some(stored.as_str()) => {
                        debug!(path = %outgoing.path, "401 for a replaced token, replaying");
                        stored
                    }
                    _ => {
                        debug!(path = %outgoing.path, "401, refreshing before retry");
                        coordinator.refresh_for_retry().await?
                    }
                };

                let replay = authorize(mark_retried(outgoing), Some(&token), &self.auth_paths);
                let (status, headers, body) = self.execute(&replay).await?;
                match on_response(status, &replay, &self.auth_paths) {
                    ResponseAction::Deliver => Ok(ApiResponse { status, headers, body }),
                    _ => Err(status_error(status, &body)),
                }
            }
        }
    }

    async fn execute(
        &self,
        request: &RequestDescriptor,
    ) -> Result<(StatusCode, HeaderMap, Bytes), SessionError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.config.url(&request.path))
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;
        Ok((status, headers, body))
    }
}

fn status_error(status: StatusCode, body: &Bytes) -> SessionError {
    SessionError::Status { status, body: String::from_utf8_lossy(body).into_owned() }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
