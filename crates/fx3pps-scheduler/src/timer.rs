//! Absolute deadline timers.
//!
//! [`RealtimeTimer`] waits in two phases: a coarse, cancellable wait on a channel
//! until shortly before the deadline, then an absolute `CLOCK_REALTIME` sleep for
//! the remainder. The coarse phase is what makes cancellation prompt; the fine
//! phase is what makes the wake-up accurate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use tracing::debug;

use crate::clock::{SystemClock, WallClock, WallTime};

/// Result of waiting for a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerWait {
    Fired,
    Cancelled,
}

/// A source of absolute wake-ups on the realtime clock.
pub trait DeadlineTimer: Send {
    /// Block until `deadline` or until the timer is cancelled.
    fn wait_until(&mut self, deadline: WallTime) -> TimerWait;

    /// Handle that cancels this timer from another thread.
    fn canceller(&self) -> TimerCanceller;
}

/// How far ahead of the deadline the coarse wait hands over to the absolute sleep.
const FINE_WINDOW_NS: i64 = 2_000_000;

/// Two-phase realtime timer.
#[derive(Debug)]
pub struct RealtimeTimer {
    signal: CancelSignal,
    canceller: TimerCanceller,
}

impl RealtimeTimer {
    pub fn new() -> Self {
        let (canceller, signal) = cancel_pair();
        Self { signal, canceller }
    }
}

impl Default for RealtimeTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadlineTimer for RealtimeTimer {
    fn wait_until(&mut self, deadline: WallTime) -> TimerWait {
        loop {
            if self.signal.is_cancelled() {
                return TimerWait::Cancelled;
            }
            let remaining = deadline.nanos_since(SystemClock.now());
            if remaining <= FINE_WINDOW_NS {
                break;
            }
            // Re-read the clock after each wait: it may have been stepped meanwhile.
            let coarse = Duration::from_nanos((remaining - FINE_WINDOW_NS).unsigned_abs());
            if self.signal.wait(coarse) {
                return TimerWait::Cancelled;
            }
        }

        crate::platform::sleep_until_realtime(deadline);

        if self.signal.is_cancelled() {
            TimerWait::Cancelled
        } else {
            TimerWait::Fired
        }
    }

    fn canceller(&self) -> TimerCanceller {
        self.canceller.clone()
    }
}

/// Create a linked canceller and the signal it raises.
///
/// Timer implementations keep the [`CancelSignal`] and hand out clones of the
/// [`TimerCanceller`].
pub fn cancel_pair() -> (TimerCanceller, CancelSignal) {
    let cancelled = Arc::new(AtomicBool::new(false));
    let (wake_tx, wake_rx) = bounded(1);
    (
        TimerCanceller {
            cancelled: Arc::clone(&cancelled),
            wake_tx,
        },
        CancelSignal { cancelled, wake_rx },
    )
}

/// Cancels a timer from another thread. Cancellation is sticky.
#[derive(Debug, Clone)]
pub struct TimerCanceller {
    cancelled: Arc<AtomicBool>,
    wake_tx: Sender<()>,
}

impl TimerCanceller {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        match self.wake_tx.try_send(()) {
            // A full channel already holds a wake-up.
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                debug!("Timer already gone, cancel only marks it");
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Receiving side of a [`TimerCanceller`].
#[derive(Debug)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
    wake_rx: Receiver<()>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Wait up to `timeout` for a cancellation; returns whether the timer is cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.wake_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tracing_test::traced_test;

    #[test]
    fn test_past_deadline_fires_immediately() {
        let mut timer = RealtimeTimer::new();
        let past = SystemClock.now().saturating_add_nanos(-1_000_000);
        assert_eq!(timer.wait_until(past), TimerWait::Fired);
    }

    #[test]
    fn test_fires_at_deadline() {
        let mut timer = RealtimeTimer::new();
        let deadline = SystemClock.now().saturating_add_nanos(20_000_000);
        assert_eq!(timer.wait_until(deadline), TimerWait::Fired);
        assert!(SystemClock.now() >= deadline);
    }

    #[test]
    fn test_cancel_wakes_coarse_wait() {
        let mut timer = RealtimeTimer::new();
        let canceller = timer.canceller();
        let deadline = SystemClock.now().saturating_add_nanos(60 * 1_000_000_000);

        let start = Instant::now();
        let handle = std::thread::spawn(move || timer.wait_until(deadline));
        std::thread::sleep(Duration::from_millis(20));
        canceller.cancel();

        let result = handle.join();
        assert!(matches!(result, Ok(TimerWait::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(canceller.is_cancelled());
    }

    #[test]
    fn test_cancel_signal_wait_times_out() {
        let (canceller, signal) = cancel_pair();
        assert!(!signal.wait(Duration::from_millis(5)));
        canceller.cancel();
        assert!(signal.wait(Duration::from_millis(5)));
        assert!(signal.is_cancelled());
    }

    #[test]
    #[traced_test]
    fn test_repeated_cancel_keeps_one_wakeup() {
        let (canceller, signal) = cancel_pair();
        canceller.cancel();
        canceller.clone().cancel();
        assert!(signal.wait(Duration::from_millis(5)));
        // The single queued wake-up was consumed; the flag still reports it.
        assert!(signal.wait(Duration::from_millis(5)));
        assert!(!logs_contain("Timer already gone"));
    }

    #[test]
    #[traced_test]
    fn test_cancel_after_timer_dropped() {
        let (canceller, signal) = cancel_pair();
        drop(signal);
        canceller.cancel();
        assert!(canceller.is_cancelled());
        assert!(logs_contain("Timer already gone"));
    }

    #[test]
    fn test_cancel_is_sticky() {
        let mut timer = RealtimeTimer::new();
        timer.canceller().cancel();
        let past = SystemClock.now().saturating_add_nanos(-1);
        assert_eq!(timer.wait_until(past), TimerWait::Cancelled);
        assert_eq!(timer.wait_until(past), TimerWait::Cancelled);
    }
}
