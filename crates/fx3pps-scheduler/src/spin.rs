//! Bounded busy-wait against a live clock.

use crate::clock::{WallClock, WallTime};

/// How a [`spin_until`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinOutcome {
    /// The target offset was reached inside the expected second.
    Reached(WallTime),
    /// The clock left the expected second before the target offset.
    SecondRolled(WallTime),
    /// The hold deadline passed before the target offset.
    HoldExceeded(WallTime),
}

impl SpinOutcome {
    /// Clock reading that ended the spin.
    pub fn at(self) -> WallTime {
        match self {
            SpinOutcome::Reached(t) | SpinOutcome::SecondRolled(t) | SpinOutcome::HoldExceeded(t) => t,
        }
    }

    pub fn is_reached(self) -> bool {
        matches!(self, SpinOutcome::Reached(_))
    }
}

/// Spin until the clock is at or past `target_offset` ns into `second`.
///
/// Never sleeps or yields. An offset of a full second or more names an instant in
/// a later second, so a target on the second boundary itself is reachable. The
/// loop ends on the first read that is at the target, outside the target's second,
/// before `second`, or at or past `hold_deadline`.
pub fn spin_until<C: WallClock + ?Sized>(
    clock: &C,
    second: i64,
    target_offset: i64,
    hold_deadline: WallTime,
) -> SpinOutcome {
    let target = WallTime::from_parts(second, target_offset);
    loop {
        let now = clock.now();
        if now >= target {
            return if now.secs() == target.secs() {
                SpinOutcome::Reached(now)
            } else {
                SpinOutcome::SecondRolled(now)
            };
        }
        if now.secs() < second {
            return SpinOutcome::SecondRolled(now);
        }
        if now >= hold_deadline {
            return SpinOutcome::HoldExceeded(now);
        }
        std::hint::spin_loop();
    }
}
