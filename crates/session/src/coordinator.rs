// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh coordinator: owns the session lifecycle, keeps the access token
//! fresh, and funnels every refresh through a single in-flight attempt.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::client::{ApiClient, InterceptorHandle};
use crate::clock::{compute_expiry, is_expiring_soon, now_ms, plan_refresh, RefreshPlan};
use crate::config::SessionConfig;
use crate::error::{RefreshError, SessionError, StoreError};
use crate::events::{EndReason, SessionEvent};
use crate::session::{AuthState, Session, SessionState, UserProfile, UserUpdate};
use crate::store::record::{self, CredentialRecord};
use crate::store::{CredentialStore, ACCESS_TOKEN, REFRESH_TOKEN, TOKEN_EXPIRY};
use crate::timer::RefreshTimer;
use crate::token_api::TokenApi;

/// Shortest re-arm delay after a refresh that returned an already-expiring token.
const MIN_REARM: Duration = Duration::from_secs(1);

/// Outcome handed to every waiter of one refresh: the new access token.
type Outcome = Option<String>;

/// In-flight flag and the callers waiting on it. Locked only briefly, never
/// across an await.
#[derive(Default)]
struct Flight {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<Outcome>>,
}

/// Settles the current flight when the refresh task ends, including by panic.
struct FlightLease {
    coordinator: Arc<RefreshCoordinator>,
    outcome: Outcome,
}

impl Drop for FlightLease {
    fn drop(&mut self) {
        let mut flight = self.coordinator.flight.lock();
        flight.in_flight = false;
        for waiter in flight.waiters.drain(..) {
            let _ = waiter.send(self.outcome.clone());
        }
    }
}

/// Session lifecycle owner shared as `Arc<RefreshCoordinator>`.
pub struct RefreshCoordinator {
    store: Arc<dyn CredentialStore>,
    session: SessionState,
    tokens: TokenApi,
    refresh_buffer_ms: u64,
    default_expires_in_secs: u64,
    flight: Mutex<Flight>,
    timer: Mutex<Option<RefreshTimer>>,
    /// Serializes credential writes. Login and logout bump it; a refresh
    /// that started under an older value discards its result.
    epoch: tokio::sync::Mutex<u64>,
    interceptor: Mutex<Option<InterceptorHandle>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl RefreshCoordinator {
    pub fn new(config: &SessionConfig, store: Arc<dyn CredentialStore>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            store,
            session: SessionState::new(),
            tokens: TokenApi::new(config),
            refresh_buffer_ms: config.refresh_buffer_ms,
            default_expires_in_secs: config.default_expires_in_secs,
            flight: Mutex::new(Flight::default()),
            timer: Mutex::new(None),
            epoch: tokio::sync::Mutex::new(0),
            interceptor: Mutex::new(None),
            event_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn current(&self) -> Option<Session> {
        self.session.current()
    }

    pub fn is_loading(&self) -> bool {
        self.session.is_loading()
    }

    pub fn state(&self) -> AuthState {
        self.session.state()
    }

    pub fn is_refreshing(&self) -> bool {
        self.flight.lock().in_flight
    }

    /// Callers currently waiting on the in-flight refresh.
    #[cfg(test)]
    pub(crate) fn queued_refreshes(&self) -> usize {
        self.flight.lock().waiters.len()
    }

    /// Access token to attach to outgoing requests.
    pub async fn bearer_token(&self) -> Result<Option<String>, StoreError> {
        self.store.get(ACCESS_TOKEN).await
    }

    /// Route `client`'s 401 handling through this coordinator. Replaces any
    /// previously attached client.
    pub fn attach(self: &Arc<Self>, client: &ApiClient) {
        let handle = client.install(Arc::downgrade(self));
        if let Some(previous) = self.interceptor.lock().replace(handle) {
            previous.dispose();
        }
    }

    /// Cancel the refresh timer and detach from the HTTP client.
    pub fn shutdown(&self) {
        self.cancel_timer();
        if let Some(handle) = self.interceptor.lock().take() {
            handle.dispose();
        }
    }

    /// Authenticate against the backend, then start a session with the grant.
    pub async fn login_with_password(
        self: &Arc<Self>,
        email: &str,
        password: &str,
    ) -> Result<Session, SessionError> {
        let grant = self.tokens.login(email, password).await?;
        let must_change_password = grant.must_change_password;
        self.login(grant.access, grant.refresh, grant.user, must_change_password, grant.expires_in)
            .await
    }

    /// Start a session from freshly issued tokens.
    ///
    /// Every record key is written before the session becomes visible. On a
    /// write failure the partial record is rolled back and the error returned.
    pub async fn login(
        self: &Arc<Self>,
        access_token: String,
        refresh_token: String,
        user: UserProfile,
        must_change_password: bool,
        expires_in_secs: Option<u64>,
    ) -> Result<Session, SessionError> {
        let expiry =
            compute_expiry(Some(expires_in_secs.unwrap_or(self.default_expires_in_secs)), now_ms());
        let record = CredentialRecord {
            access_token,
            refresh_token,
            token_expiry: Some(expiry),
            user,
            must_change_password,
        };

        let mut epoch = self.epoch.lock().await;
        *epoch += 1;
        self.cancel_timer();

        if let Err(e) = record::save(&*self.store, &record).await {
            warn!(err = %e, "failed to persist credentials, rolling back");
            if let Err(e) = record::clear(&*self.store).await {
                warn!(err = %e, "rollback of partial credentials failed");
            }
            if self.session.clear().is_some() {
                self.emit(SessionEvent::Ended { reason: EndReason::Expired });
            }
            return Err(e.into());
        }

        let session = Session::new(record.user, must_change_password, record.access_token);
        self.session.set(session.clone());
        self.schedule_token_refresh(expiry);
        drop(epoch);

        info!(user_id = %session.id, "logged in");
        self.emit(SessionEvent::LoggedIn { user_id: session.id.clone() });
        Ok(session)
    }

    /// End the session: delete credentials, cancel the timer, clear state.
    ///
    /// A silent logout only logs storage failures. Idempotent.
    pub async fn logout(&self, silent: bool) -> Result<(), StoreError> {
        let reason = if silent { EndReason::Expired } else { EndReason::UserLogout };
        let mut epoch = self.epoch.lock().await;
        let result = self.end_session(&mut epoch, reason).await;
        drop(epoch);

        match result {
            Err(e) if silent => {
                warn!(err = %e, "failed to clear credentials on silent logout");
                Ok(())
            }
            other => other,
        }
    }

    /// Silent logout, unless the session changed since `seen_epoch`.
    async fn expire(&self, seen_epoch: u64) {
        let mut epoch = self.epoch.lock().await;
        if *epoch != seen_epoch {
            debug!("session changed, skipping expiry logout");
            return;
        }
        if let Err(e) = self.end_session(&mut epoch, EndReason::Expired).await {
            warn!(err = %e, "failed to clear credentials on silent logout");
        }
    }

    async fn end_session(&self, epoch: &mut u64, reason: EndReason) -> Result<(), StoreError> {
        *epoch += 1;
        self.cancel_timer();
        let result = record::clear(&*self.store).await;
        if let Some(session) = self.session.clear() {
            info!(user_id = %session.id, ?reason, "session ended");
            self.emit(SessionEvent::Ended { reason });
        }
        result
    }

    /// Rebuild the session from the credential store at startup.
    pub async fn restore(self: &Arc<Self>) -> AuthState {
        self.session.set_loading(true);
        let state = self.restore_inner().await;
        self.session.set_loading(false);
        state
    }

    async fn restore_inner(self: &Arc<Self>) -> AuthState {
        let seen_epoch = *self.epoch.lock().await;
        let record = match record::load(&*self.store).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("no stored credentials");
                return AuthState::Unauthenticated;
            }
            Err(e) => {
                warn!(err = %e, "failed to read stored credentials");
                self.expire(seen_epoch).await;
                return AuthState::Unauthenticated;
            }
        };

        let mut access_token = record.access_token;
        if is_expiring_soon(record.token_expiry, now_ms(), self.refresh_buffer_ms) {
            info!("stored access token is expiring, refreshing");
            match self.refresh_shared().await {
                Some(token) => access_token = token,
                None => {
                    self.expire(seen_epoch).await;
                    return AuthState::Unauthenticated;
                }
            }
        } else if let Some(expiry) = record.token_expiry {
            self.schedule_token_refresh(expiry);
        }

        let epoch = self.epoch.lock().await;
        if *epoch != seen_epoch {
            debug!("session changed during restore");
            return self.session.state();
        }
        let session = Session::new(record.user, record.must_change_password, access_token);
        self.session.set(session.clone());
        drop(epoch);

        info!(user_id = %session.id, "session restored");
        self.emit(SessionEvent::Restored { user_id: session.id });
        AuthState::Authenticated
    }

    /// Merge profile changes into the session and persist them.
    pub async fn update_user(&self, update: UserUpdate) -> Result<Session, SessionError> {
        let _epoch = self.epoch.lock().await;
        let session = self.session.merge(update).ok_or(SessionError::Unauthenticated)?;
        record::save_user(&*self.store, &session.profile(), session.must_change_password).await?;
        Ok(session)
    }

    /// Refresh the access token, joining any refresh already in flight.
    ///
    /// `false` when no refresh token is stored, the server rejected it (the
    /// session is then logged out), or the attempt failed transiently.
    pub async fn refresh_access_token(self: &Arc<Self>) -> bool {
        self.refresh_shared().await.is_some()
    }

    /// Refresh on behalf of a request that got a 401.
    ///
    /// Any failure ends the session; every queued request sees the same
    /// [`SessionError::SessionExpired`].
    pub async fn refresh_for_retry(self: &Arc<Self>) -> Result<String, SessionError> {
        let seen_epoch = *self.epoch.lock().await;
        match self.refresh_shared().await {
            Some(token) => Ok(token),
            None => {
                self.expire(seen_epoch).await;
                Err(SessionError::SessionExpired)
            }
        }
    }

    /// Join the in-flight refresh, or start one and wait for it.
    ///
    /// The refresh itself runs on its own task so a caller that gives up
    /// does not fail the other waiters.
    async fn refresh_shared(self: &Arc<Self>) -> Outcome {
        let (tx, rx) = oneshot::channel();
        let leader = {
            let mut flight = self.flight.lock();
            flight.waiters.push_back(tx);
            !std::mem::replace(&mut flight.in_flight, true)
        };

        if leader {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                let mut lease = FlightLease { coordinator, outcome: None };
                lease.outcome = lease.coordinator.run_refresh().await;
            });
        } else {
            debug!("refresh in flight, queued");
        }

        rx.await.ok().flatten()
    }

    async fn run_refresh(self: &Arc<Self>) -> Outcome {
        let seen_epoch = *self.epoch.lock().await;
        match self.try_refresh(seen_epoch).await {
            Ok(token) => Some(token),
            Err(RefreshError::MissingToken) => {
                debug!("no refresh token stored, skipping refresh");
                None
            }
            Err(RefreshError::Superseded) => {
                debug!("session changed during refresh, discarding result");
                None
            }
            Err(e @ RefreshError::Rejected(_)) => {
                warn!(err = %e, "refresh token rejected, logging out");
                self.emit(SessionEvent::RefreshFailed { error: e.to_string() });
                self.expire(seen_epoch).await;
                None
            }
            Err(e @ RefreshError::Transient(_)) => {
                warn!(err = %e, "token refresh failed");
                self.emit(SessionEvent::RefreshFailed { error: e.to_string() });
                None
            }
        }
    }

    async fn try_refresh(self: &Arc<Self>, seen_epoch: u64) -> Result<String, RefreshError> {
        let refresh_token = self.store.get(REFRESH_TOKEN).await?.ok_or(RefreshError::MissingToken)?;
        let grant = self.tokens.refresh(&refresh_token).await?;
        let expiry =
            compute_expiry(Some(grant.expires_in.unwrap_or(self.default_expires_in_secs)), now_ms());

        let epoch = self.epoch.lock().await;
        if *epoch != seen_epoch {
            return Err(RefreshError::Superseded);
        }
        self.store.set(ACCESS_TOKEN, &grant.access).await?;
        if let Some(rotated) = grant.refresh.as_deref() {
            self.store.set(REFRESH_TOKEN, rotated).await?;
        }
        self.store.set(TOKEN_EXPIRY, &expiry.to_string()).await?;
        self.session.replace_access_token(&grant.access);
        drop(epoch);

        info!(expires_at_ms = expiry, rotated = grant.refresh.is_some(), "access token refreshed");
        self.emit(SessionEvent::Refreshed { expires_at_ms: expiry });
        self.rearm_after_refresh(expiry);
        Ok(grant.access)
    }

    /// Arm the refresh timer for a token expiring at `expiry_ms`.
    ///
    /// Inside the buffer the refresh starts immediately. If the timed refresh
    /// fails the session is logged out.
    pub fn schedule_token_refresh(self: &Arc<Self>, expiry_ms: u64) {
        let delay = match plan_refresh(expiry_ms, now_ms(), self.refresh_buffer_ms) {
            RefreshPlan::Immediate => Duration::ZERO,
            RefreshPlan::After(delay) => delay,
        };
        self.arm(delay);
    }

    /// A freshly issued token already inside the buffer is not refreshed
    /// again at once; wait half its remaining life instead.
    fn rearm_after_refresh(self: &Arc<Self>, expiry_ms: u64) {
        let now = now_ms();
        let delay = match plan_refresh(expiry_ms, now, self.refresh_buffer_ms) {
            RefreshPlan::After(delay) => delay,
            RefreshPlan::Immediate => {
                Duration::from_millis(expiry_ms.saturating_sub(now) / 2).max(MIN_REARM)
            }
        };
        self.arm(delay);
    }

    fn arm(self: &Arc<Self>, delay: Duration) {
        debug!(delay_ms = delay.as_millis() as u64, "refresh timer armed");
        let weak = Arc::downgrade(self);
        let timer = RefreshTimer::schedule(delay, async move {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.on_timer().await;
            }
        });
        let previous = self.timer.lock().replace(timer);
        drop(previous);
    }

    async fn on_timer(self: &Arc<Self>) {
        let seen_epoch = *self.epoch.lock().await;
        if !self.refresh_access_token().await {
            warn!("scheduled refresh failed, logging out");
            self.expire(seen_epoch).await;
        }
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.cancel();
        }
    }

    /// Whether a refresh timer is armed and has not fired.
    pub fn has_pending_refresh(&self) -> bool {
        self.timer.lock().as_ref().is_some_and(|t| !t.is_cancelled() && !t.is_finished())
    }

    /// Refresh if the stored token is inside the buffer. Called when the app
    /// returns to the foreground. Failures are logged only.
    pub async fn check_token_validity(self: &Arc<Self>) {
        if !self.session.is_authenticated() {
            debug!("no session, skipping token check");
            return;
        }
        let expiry = match record::load_expiry(&*self.store).await {
            Ok(expiry) => expiry,
            Err(e) => {
                warn!(err = %e, "failed to read token expiry");
                return;
            }
        };
        if is_expiring_soon(expiry, now_ms(), self.refresh_buffer_ms) {
            info!("access token expiring, refreshing");
            if !self.refresh_access_token().await {
                warn!("foreground refresh failed");
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Drop for RefreshCoordinator {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
