//! Exporter lifecycle: `Running -> ShuttingDown -> Shutdown`, with a forced
//! kill path that discards queued work.
//!
//! Two kinds of waiters coordinate through this state:
//! - the async dispatcher pump, woken through a [`Notify`] when shutdown is
//!   initiated;
//! - synchronous callers of [`Lifecycle::wait_for_termination`], blocked on
//!   a condvar independent of the async runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Lifecycle phase of the exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting and processing submissions.
    Running,
    /// No longer accepting submissions; draining in-flight work.
    ShuttingDown,
    /// Fully drained and stopped.
    Shutdown,
}

#[derive(Debug)]
struct Inner {
    phase: Mutex<Phase>,
    terminated: Condvar,
    killed: AtomicBool,
    shutdown_notify: Notify,
}

/// Cloneable handle to the shared lifecycle state.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    inner: Arc<Inner>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Creates a lifecycle in the `Running` phase.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                phase: Mutex::new(Phase::Running),
                terminated: Condvar::new(),
                killed: AtomicBool::new(false),
                shutdown_notify: Notify::new(),
            }),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        *self.inner.phase.lock().unwrap()
    }

    /// Returns `true` if submissions are still accepted.
    pub fn is_running(&self) -> bool {
        self.phase() == Phase::Running
    }

    /// Returns `true` while draining in-flight work after shutdown began.
    pub fn is_shutting_down(&self) -> bool {
        self.phase() == Phase::ShuttingDown
    }

    /// Returns `true` once fully drained and stopped.
    pub fn is_shutdown(&self) -> bool {
        self.phase() == Phase::Shutdown
    }

    /// Returns `true` if queued work was discarded by [`kill`](Self::kill).
    pub fn is_killed(&self) -> bool {
        self.inner.killed.load(Ordering::Acquire)
    }

    /// Transitions `Running -> ShuttingDown` and wakes the dispatcher pump.
    /// Idempotent: only the first call has effect; returns whether this
    /// call performed the transition.
    pub fn initiate_shutdown(&self) -> bool {
        let mut phase = self.inner.phase.lock().unwrap();
        if *phase != Phase::Running {
            return false;
        }
        *phase = Phase::ShuttingDown;
        drop(phase);
        self.inner.shutdown_notify.notify_waiters();
        true
    }

    /// As [`initiate_shutdown`](Self::initiate_shutdown), but additionally
    /// marks queued-but-not-started work for discard. In-flight work still
    /// completes. Valid from `Running` or `ShuttingDown`.
    pub fn kill(&self) {
        let phase = self.phase();
        if phase == Phase::Shutdown {
            return;
        }
        self.inner.killed.store(true, Ordering::Release);
        self.initiate_shutdown();
        // Wake the pump again in case it was already draining.
        self.inner.shutdown_notify.notify_waiters();
    }

    /// Marks the terminal phase and releases every blocked waiter.
    /// Called by the dispatcher pump once the queue is drained and all
    /// in-flight work has finished.
    pub(crate) fn mark_shutdown(&self) {
        let mut phase = self.inner.phase.lock().unwrap();
        *phase = Phase::Shutdown;
        drop(phase);
        self.inner.terminated.notify_all();
    }

    /// Blocks the calling thread until the `Shutdown` phase is reached or
    /// `timeout` elapses. Returns `true` if termination was observed.
    pub fn wait_for_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut phase = self.inner.phase.lock().unwrap();
        while *phase != Phase::Shutdown {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .terminated
                .wait_timeout(phase, deadline - now)
                .unwrap();
            phase = guard;
        }
        true
    }

    /// Resolves once shutdown has been initiated. Used by the dispatcher
    /// pump inside `select!`.
    pub(crate) async fn shutdown_initiated(&self) {
        loop {
            // Arm the waiter before re-checking the phase so a transition
            // between check and await cannot be missed.
            let notified = self.inner.shutdown_notify.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.is_running());
        assert!(!lifecycle.is_shutting_down());
        assert!(!lifecycle.is_shutdown());
        assert!(!lifecycle.is_killed());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.initiate_shutdown());
        assert!(!lifecycle.initiate_shutdown());
        assert!(lifecycle.is_shutting_down());
    }

    #[test]
    fn kill_sets_flag_from_either_phase() {
        let from_running = Lifecycle::new();
        from_running.kill();
        assert!(from_running.is_killed());
        assert!(from_running.is_shutting_down());

        let from_draining = Lifecycle::new();
        from_draining.initiate_shutdown();
        from_draining.kill();
        assert!(from_draining.is_killed());
    }

    #[test]
    fn wait_times_out_while_draining() {
        let lifecycle = Lifecycle::new();
        lifecycle.initiate_shutdown();
        assert!(!lifecycle.wait_for_termination(Duration::from_millis(20)));
    }

    #[test]
    fn wait_observes_termination_from_another_thread() {
        let lifecycle = Lifecycle::new();
        let remote = lifecycle.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.initiate_shutdown();
            remote.mark_shutdown();
        });
        assert!(lifecycle.wait_for_termination(Duration::from_secs(5)));
        assert!(lifecycle.is_shutdown());
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn pump_waiter_wakes_on_shutdown() {
        let lifecycle = Lifecycle::new();
        let waiter = lifecycle.clone();
        let task = tokio::spawn(async move { waiter.shutdown_initiated().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        lifecycle.initiate_shutdown();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn pump_waiter_resolves_immediately_after_shutdown() {
        let lifecycle = Lifecycle::new();
        lifecycle.initiate_shutdown();
        tokio::time::timeout(Duration::from_millis(100), lifecycle.shutdown_initiated())
            .await
            .expect("already shut down");
    }
}
