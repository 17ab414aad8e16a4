//! Graceful shutdown controller with in-flight request tracking.
//!
//! Uses `ArcSwap` for lock-free health state transitions, a `watch` channel
//! to announce the drain, and an atomic counter with RAII guards for
//! in-flight requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

/// Server health state, transitioned by the shutdown controller.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Listener bound, not yet serving.
    Starting,
    /// Serving requests.
    Ready,
    /// Shutdown requested; no new connections, in-flight requests finishing.
    Draining,
    /// Server loop has exited.
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Coordinates shutdown across the server.
///
/// 1. Health probes read `health_state()`
/// 2. The request middleware holds an [`InFlightGuard`] per request
/// 3. `begin_drain()` moves to Draining and wakes every drain receiver
/// 4. The serve loop bounds the drain and calls `mark_stopped()`
#[derive(Debug)]
pub struct ShutdownController {
    drain_signal: watch::Sender<bool>,
    in_flight: Arc<AtomicU64>,
    health_state: ArcSwap<HealthState>,
}

impl ShutdownController {
    /// Creates a new shutdown controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            drain_signal: tx,
            in_flight: Arc::new(AtomicU64::new(0)),
            health_state: ArcSwap::from_pointee(HealthState::Starting),
        }
    }

    pub fn set_ready(&self) {
        self.health_state.store(Arc::new(HealthState::Ready));
    }

    /// Returns a receiver whose value flips to `true` when draining starts.
    #[must_use]
    pub fn drain_receiver(&self) -> watch::Receiver<bool> {
        self.drain_signal.subscribe()
    }

    /// Moves to `Draining` and notifies every drain receiver.
    ///
    /// Calling it again is a no-op for receivers: the value stays `true`.
    pub fn begin_drain(&self) {
        self.health_state.store(Arc::new(HealthState::Draining));
        self.drain_signal.send_replace(true);
    }

    pub fn mark_stopped(&self) {
        self.health_state.store(Arc::new(HealthState::Stopped));
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health_state.load()
    }

    /// Creates an RAII guard that tracks an in-flight request.
    ///
    /// The counter is decremented when the guard drops, including when the
    /// request future is cancelled.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that decrements the in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_starting() {
        let controller = ShutdownController::new();
        assert_eq!(controller.health_state(), HealthState::Starting);
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[test]
    fn state_machine_transitions() {
        let controller = ShutdownController::new();
        controller.set_ready();
        assert_eq!(controller.health_state(), HealthState::Ready);

        controller.begin_drain();
        assert_eq!(controller.health_state(), HealthState::Draining);

        controller.mark_stopped();
        assert_eq!(controller.health_state(), HealthState::Stopped);
        assert_eq!(controller.health_state().as_str(), "stopped");
    }

    #[test]
    fn in_flight_guard_increments_and_decrements() {
        let controller = ShutdownController::new();

        let guard1 = controller.in_flight_guard();
        let guard2 = controller.in_flight_guard();
        assert_eq!(controller.in_flight_count(), 2);

        drop(guard1);
        assert_eq!(controller.in_flight_count(), 1);

        drop(guard2);
        assert_eq!(controller.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn drain_receiver_notified() {
        let controller = ShutdownController::new();
        let mut rx = controller.drain_receiver();
        assert!(!*rx.borrow());

        controller.begin_drain();

        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn guard_released_when_future_is_cancelled() {
        let controller = Arc::new(ShutdownController::new());
        let ctrl = Arc::clone(&controller);
        let task = tokio::spawn(async move {
            let _guard = ctrl.in_flight_guard();
            std::future::pending::<()>().await;
        });

        tokio::task::yield_now().await;
        while controller.in_flight_count() == 0 {
            tokio::task::yield_now().await;
        }
        task.abort();
        let _ = task.await;
        assert_eq!(controller.in_flight_count(), 0);
    }
}
