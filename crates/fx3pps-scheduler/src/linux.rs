//! Linux-specific platform implementation.

use libc::{
    CLOCK_REALTIME, EINTR, MCL_CURRENT, MCL_FUTURE, SCHED_FIFO, TIMER_ABSTIME, clock_gettime,
    clock_nanosleep, cpu_set_t, mlockall, sched_param, sched_setaffinity, sched_setscheduler,
    timespec,
};
use tracing::warn;

use crate::clock::WallTime;
use crate::rt_setup::{RtSetup, RtSetupReport};

/// Read `CLOCK_REALTIME`.
pub fn realtime_now() -> WallTime {
    let mut ts = timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
    let rc = unsafe { clock_gettime(CLOCK_REALTIME, &mut ts) };
    if rc != 0 {
        return WallTime::from_nanos(system_time_nanos());
    }
    WallTime::from_parts(i64::from(ts.tv_sec), i64::from(ts.tv_nsec))
}

fn system_time_nanos() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Sleep until `deadline` on `CLOCK_REALTIME` with an absolute timer.
///
/// An absolute sleep tracks clock steps made while sleeping, which a relative
/// sleep computed beforehand would not.
pub fn sleep_until_realtime(deadline: WallTime) {
    let ts = timespec {
        tv_sec: deadline.secs() as libc::time_t,
        tv_nsec: deadline.subsec_nanos() as libc::c_long,
    };

    loop {
        // SAFETY: `ts` outlives the call; `rem` may be null with TIMER_ABSTIME.
        let rc = unsafe { clock_nanosleep(CLOCK_REALTIME, TIMER_ABSTIME, &ts, std::ptr::null_mut()) };
        if rc != EINTR {
            break;
        }
    }
}

/// Apply Linux-specific RT setup to the calling thread.
pub fn apply_rt_setup(setup: &RtSetup) -> RtSetupReport {
    let mut report = RtSetupReport::default();

    if setup.high_priority {
        let param = sched_param {
            sched_priority: setup.priority.clamp(1, 99),
        };
        // SAFETY: `param` is a valid sched_param; pid 0 targets the calling thread.
        let rc = unsafe { sched_setscheduler(0, SCHED_FIFO, &param) };
        if rc == 0 {
            report.priority_applied = true;
        } else {
            warn!(
                error = %std::io::Error::last_os_error(),
                "SCHED_FIFO unavailable, edge jitter will be higher"
            );
        }
    }

    if setup.lock_memory {
        // SAFETY: mlockall takes only flags and touches no caller memory.
        let rc = unsafe { mlockall(MCL_CURRENT | MCL_FUTURE) };
        if rc == 0 {
            report.memory_locked = true;
        } else {
            warn!(
                error = %std::io::Error::last_os_error(),
                "Cannot lock memory"
            );
        }
    }

    if let Some(mask) = setup.cpu_affinity {
        report.affinity_applied = set_affinity(mask);
    }

    report
}

fn set_affinity(mask: u64) -> bool {
    // SAFETY: cpu_set_t is a plain bit array for which all-zeroes is the empty set.
    let mut set: cpu_set_t = unsafe { std::mem::zeroed() };
    for cpu in 0..64usize {
        if mask & (1u64 << cpu) != 0 {
            // SAFETY: `cpu` is below 64, well inside CPU_SETSIZE, and `set` is valid.
            unsafe { libc::CPU_SET(cpu, &mut set) };
        }
    }

    // SAFETY: `set` is a valid cpu_set_t of the size passed; pid 0 is the calling thread.
    let rc = unsafe { sched_setaffinity(0, std::mem::size_of::<cpu_set_t>(), &set) };
    if rc != 0 {
        warn!(
            mask = format_args!("{mask:#x}"),
            error = %std::io::Error::last_os_error(),
            "Cannot set CPU affinity"
        );
        return false;
    }
    true
}
