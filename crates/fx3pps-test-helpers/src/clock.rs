//! Deterministic wall clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use fx3pps_scheduler::{WallClock, WallTime};

/// A shared simulated clock.
///
/// Every [`now`](WallClock::now) returns the current reading and then advances it
/// by `step` ns, so busy-wait loops make progress. Clones share the same time.
#[derive(Debug, Clone)]
pub struct SimClock {
    now: Arc<AtomicI64>,
    step: i64,
}

impl SimClock {
    pub fn new(start: WallTime, step_ns: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start.as_nanos())),
            step: step_ns,
        }
    }

    /// Clock starting at `secs` seconds and `nanos` ns, stepping 100 ns per read.
    pub fn at(secs: i64, nanos: i64) -> Self {
        Self::new(WallTime::from_parts(secs, nanos), 100)
    }

    /// Current reading without advancing.
    pub fn peek(&self) -> WallTime {
        WallTime::from_nanos(self.now.load(Ordering::SeqCst))
    }

    pub fn set(&self, t: WallTime) {
        self.now.store(t.as_nanos(), Ordering::SeqCst);
    }

    pub fn advance(&self, nanos: i64) {
        self.now.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl WallClock for SimClock {
    fn now(&self) -> WallTime {
        WallTime::from_nanos(self.now.fetch_add(self.step, Ordering::SeqCst))
    }
}
