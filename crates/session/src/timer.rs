// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellable one-shot timer.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a scheduled callback. Dropping the handle cancels it.
///
/// Cancellation only stops a timer that has not fired yet; once the delay
/// elapses the callback runs to completion.
#[derive(Debug)]
pub struct RefreshTimer {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshTimer {
    /// Run `callback` after `delay` unless cancelled first. A zero delay runs
    /// it on the next scheduler turn.
    pub fn schedule<F>(delay: Duration, callback: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = token.cancelled() => return,
                }
            } else if token.is_cancelled() {
                return;
            }
            callback.await;
        });
        Self { cancel, task }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the callback has finished (or was cancelled and exited).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
