//! Fallback platform implementation for non-Linux systems.
//!
//! No RT scheduling and a relative sleep: edges still come out, with whatever
//! jitter the host scheduler adds.

use crate::clock::WallTime;
use crate::rt_setup::{RtSetup, RtSetupReport};

pub fn realtime_now() -> WallTime {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0);
    WallTime::from_nanos(nanos)
}

pub fn sleep_until_realtime(deadline: WallTime) {
    let remaining = deadline.nanos_since(realtime_now());
    if remaining > 0 {
        std::thread::sleep(std::time::Duration::from_nanos(remaining.unsigned_abs()));
    }
}

pub fn apply_rt_setup(_setup: &RtSetup) -> RtSetupReport {
    RtSetupReport::default()
}
