//! Wall-clock time as seen by the edge scheduler.
//!
//! Edges are placed relative to UTC second boundaries, so everything here is
//! `CLOCK_REALTIME`, not a monotonic clock. A [`WallTime`] is signed nanoseconds
//! since the Unix epoch, which keeps second/offset arithmetic exact.

use std::fmt;

use crate::NSEC_PER_SEC;

/// A point on the realtime clock, in nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct WallTime(i64);

impl WallTime {
    #[inline]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Build a time from a whole second and a nanosecond offset.
    ///
    /// The offset is not required to be below one second; it is folded into
    /// the seconds.
    #[inline]
    pub const fn from_parts(secs: i64, nanos: i64) -> Self {
        Self(secs.saturating_mul(NSEC_PER_SEC).saturating_add(nanos))
    }

    #[inline]
    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    /// Whole seconds, rounded towards negative infinity.
    #[inline]
    pub const fn secs(self) -> i64 {
        self.0.div_euclid(NSEC_PER_SEC)
    }

    /// Offset into the current second, always in `0..NSEC_PER_SEC`.
    #[inline]
    pub const fn subsec_nanos(self) -> i64 {
        self.0.rem_euclid(NSEC_PER_SEC)
    }

    /// Signed nanoseconds from `earlier` to `self`.
    #[inline]
    pub const fn nanos_since(self, earlier: WallTime) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    #[inline]
    #[must_use]
    pub const fn saturating_add_nanos(self, nanos: i64) -> Self {
        Self(self.0.saturating_add(nanos))
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.secs(), self.subsec_nanos())
    }
}

/// Source of the current realtime clock reading.
///
/// Every call is a fresh read; the busy-wait loops poll it directly.
pub trait WallClock: Send + Sync {
    fn now(&self) -> WallTime;
}

impl<C: WallClock + ?Sized> WallClock for std::sync::Arc<C> {
    #[inline]
    fn now(&self) -> WallTime {
        (**self).now()
    }
}

/// The system `CLOCK_REALTIME`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    #[inline]
    fn now(&self) -> WallTime {
        crate::platform::realtime_now()
    }
}
