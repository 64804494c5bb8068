//! Scripted deadline timer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use fx3pps_scheduler::{
    CancelSignal, DeadlineTimer, TimerCanceller, TimerWait, WallTime, cancel_pair,
};
use parking_lot::Mutex;

use crate::clock::SimClock;

/// A [`DeadlineTimer`] that fires instantly on a [`SimClock`].
///
/// Each wait sets the clock to the deadline plus the next scripted lateness (ns)
/// and fires. Once the script is used up the timer blocks until cancelled, so a
/// generator thread stays parked instead of exiting.
#[derive(Debug)]
pub struct ScriptedTimer {
    clock: SimClock,
    lateness: VecDeque<i64>,
    deadlines: Arc<Mutex<Vec<WallTime>>>,
    signal: CancelSignal,
    canceller: TimerCanceller,
}

impl ScriptedTimer {
    pub fn new(clock: SimClock, lateness: impl IntoIterator<Item = i64>) -> Self {
        let (canceller, signal) = cancel_pair();
        Self {
            clock,
            lateness: lateness.into_iter().collect(),
            deadlines: Arc::new(Mutex::new(Vec::new())),
            signal,
            canceller,
        }
    }

    /// Fire `cycles` times, always exactly on the deadline.
    pub fn punctual(clock: SimClock, cycles: usize) -> Self {
        Self::new(clock, std::iter::repeat_n(0, cycles))
    }

    /// Shared log of every deadline waited for, fired or not.
    pub fn deadline_log(&self) -> Arc<Mutex<Vec<WallTime>>> {
        Arc::clone(&self.deadlines)
    }
}

impl DeadlineTimer for ScriptedTimer {
    fn wait_until(&mut self, deadline: WallTime) -> TimerWait {
        self.deadlines.lock().push(deadline);
        if self.signal.is_cancelled() {
            return TimerWait::Cancelled;
        }
        match self.lateness.pop_front() {
            Some(late_ns) => {
                self.clock.set(deadline.saturating_add_nanos(late_ns));
                TimerWait::Fired
            }
            None => {
                while !self.signal.wait(Duration::from_millis(50)) {}
                TimerWait::Cancelled
            }
        }
    }

    fn canceller(&self) -> TimerCanceller {
        self.canceller.clone()
    }
}
