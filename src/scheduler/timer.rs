//! One-shot cancellable timer built on a spawned tokio task
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.3.0
//!
//! ## Changelog
//! - 1.0.0: Initial release

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const STATE_ARMED: u8 = 0;
const STATE_FIRED: u8 = 1;
const STATE_CANCELLED: u8 = 2;

/// Lifecycle of a one-shot timer. Once fired or cancelled a timer never
/// re-arms; a replacement must be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Armed,
    Fired,
    Cancelled,
}

/// Handle to a single scheduled future callback.
///
/// The callback runs on its own tokio task once `delay` elapses. Cancellation
/// is decided by a compare-and-swap on the shared state: whichever of
/// `cancel` and the firing instant claims the slot first wins, so a timer
/// cancelled before its deadline never runs its callback, and cancelling an
/// already-fired timer is a no-op. A callback that is already mid-execution
/// when `cancel` arrives may still complete that one firing.
#[derive(Debug)]
pub struct Timer {
    state: Arc<AtomicU8>,
    handle: JoinHandle<()>,
}

impl Timer {
    /// Arm a timer that runs `callback` once `delay` has elapsed.
    pub fn after<F>(delay: Duration, callback: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(STATE_ARMED));
        let task_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Claim the firing; a cancel that got here first wins.
            if task_state
                .compare_exchange(STATE_ARMED, STATE_FIRED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                callback.await;
            }
        });
        Timer { state, handle }
    }

    /// Prevent a still-armed timer from firing. No-op on fired or cancelled
    /// timers.
    pub fn cancel(&self) {
        if self
            .state
            .compare_exchange(STATE_ARMED, STATE_CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.handle.abort();
        }
    }

    pub fn state(&self) -> TimerState {
        match self.state.load(Ordering::Acquire) {
            STATE_FIRED => TimerState::Fired,
            STATE_CANCELLED => TimerState::Cancelled,
            _ => TimerState::Armed,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state() == TimerState::Armed
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = Timer::after(Duration::from_secs(30), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(timer.state(), TimerState::Armed);
        sleep(Duration::from_secs(31)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.state(), TimerState::Fired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = Timer::after(Duration::from_secs(30), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_secs(10)).await;
        timer.cancel();
        assert_eq!(timer.state(), TimerState::Cancelled);

        sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_firing_is_noop() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let timer = Timer::after(Duration::from_secs(5), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_secs(6)).await;
        timer.cancel();
        timer.cancel();
        assert_eq!(timer.state(), TimerState::Fired);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_armed_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        {
            let _timer = Timer::after(Duration::from_secs(5), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
