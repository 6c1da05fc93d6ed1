// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Foreground watcher: re-checks token validity when the app becomes active.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::coordinator::RefreshCoordinator;

/// Application visibility as reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    #[default]
    Active,
    Inactive,
    Background,
}

/// Only a move into `Active` from another state counts.
pub fn is_foreground_transition(previous: AppState, next: AppState) -> bool {
    next == AppState::Active && previous != AppState::Active
}

/// Run [`RefreshCoordinator::check_token_validity`] on every transition to
/// the foreground until `shutdown` fires or the sender is dropped.
///
/// The task holds only a weak reference to the coordinator.
pub fn spawn_foreground_watch(
    coordinator: &Arc<RefreshCoordinator>,
    mut app_state: watch::Receiver<AppState>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let coordinator = Arc::downgrade(coordinator);
    tokio::spawn(async move {
        let mut previous = *app_state.borrow_and_update();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = app_state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = *app_state.borrow_and_update();
                    if is_foreground_transition(previous, next) {
                        let Some(coordinator) = coordinator.upgrade() else { break };
                        debug!("app foregrounded, checking token");
                        coordinator.check_token_validity().await;
                    }
                    previous = next;
                }
            }
        }
        debug!("foreground watch stopped");
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
