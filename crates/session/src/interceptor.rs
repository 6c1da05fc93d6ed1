// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request and response hooks, as pure decisions over a request description.
//!
//! [`ApiClient`](crate::ApiClient) performs the I/O these functions ask for.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};

/// An outgoing request, before transport.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Path relative to the API base URL, optionally with a query string.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Set once the request has been replayed after a refresh.
    pub retried: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), headers: HeaderMap::new(), body: None, retried: false }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// JSON body with a matching content type.
    pub fn json(mut self, body: &serde_json::Value) -> Self {
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(Bytes::from(body.to_string()));
        self
    }

    pub fn bearer(&self) -> Option<&str> {
        self.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
    }
}

/// What to do with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseAction {
    /// Success: hand the response to the caller.
    Deliver,
    /// Failure: return it to the caller as an error, unchanged.
    Propagate,
    /// Refresh the access token, then replay the request once.
    RefreshAndRetry,
}

/// Whether `path` is one of the auth endpoints, ignoring query and trailing slash.
pub fn is_auth_endpoint(path: &str, auth_paths: &[String]) -> bool {
    let path = path.split('?').next().unwrap_or(path).trim_end_matches('/');
    auth_paths.iter().any(|p| p.trim_end_matches('/') == path)
}

/// Request hook: attach the bearer token, except on auth endpoints.
pub fn authorize(
    mut request: RequestDescriptor,
    token: Option<&str>,
    auth_paths: &[String],
) -> RequestDescriptor {
    if is_auth_endpoint(&request.path, auth_paths) {
        request.headers.remove(AUTHORIZATION);
        return request;
    }
    match token.map(|t| HeaderValue::from_str(&format!("Bearer {t}"))) {
        Some(Ok(value)) => {
            request.headers.insert(AUTHORIZATION, value);
        }
        Some(Err(_)) => tracing::warn!("stored access token is not a valid header value"),
        None => {}
    }
    request
}

/// Response hook.
///
/// Only a 401 on a non-auth endpoint that has not been retried yet asks for
/// a refresh.
pub fn on_response(
    status: StatusCode,
    request: &RequestDescriptor,
    auth_paths: &[String],
) -> ResponseAction {
    if status.is_success() {
        ResponseAction::Deliver
    } else if status == StatusCode::UNAUTHORIZED
        && !request.retried
        && !is_auth_endpoint(&request.path, auth_paths)
    {
        ResponseAction::RefreshAndRetry
    } else {
        ResponseAction::Propagate
    }
}

/// Mark a request as replayed so it is never retried again.
pub fn mark_retried(mut request: RequestDescriptor) -> RequestDescriptor {
    request.retried = true;
    request
}

#[cfg(test)]
#[path = "interceptor_tests.rs"]
mod tests;
