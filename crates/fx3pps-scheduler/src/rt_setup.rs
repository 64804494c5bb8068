//! Real-time setup configuration.
//!
//! A user-space thread cannot mask interrupts while it polls the clock. The
//! closest equivalent is a
//! `SCHED_FIFO` priority high enough not to be preempted by ordinary work,
//! locked memory so the spin never page-faults, and an optional dedicated CPU.
//! What remains (interrupts and higher-priority RT threads) bounds the achievable
//! edge precision on a given host.

use serde::{Deserialize, Serialize};

/// Real-time setup applied to the generator's timer thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtSetup {
    /// Enable `SCHED_FIFO` scheduling.
    pub high_priority: bool,

    /// `SCHED_FIFO` priority (1-99) used when `high_priority` is set.
    pub priority: i32,

    /// Lock all current and future memory pages.
    pub lock_memory: bool,

    /// CPU affinity mask (None = no affinity).
    ///
    /// Each bit represents a CPU core (bit 0 = core 0, etc.).
    pub cpu_affinity: Option<u64>,
}

impl Default for RtSetup {
    fn default() -> Self {
        Self {
            high_priority: true,
            priority: 80,
            lock_memory: true,
            cpu_affinity: None,
        }
    }
}

impl RtSetup {
    pub fn new() -> Self {
        Self::default()
    }

    /// No special configuration.
    pub fn minimal() -> Self {
        Self {
            high_priority: false,
            priority: 80,
            lock_memory: false,
            cpu_affinity: None,
        }
    }

    pub fn with_high_priority(mut self, enabled: bool) -> Self {
        self.high_priority = enabled;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_lock_memory(mut self, enabled: bool) -> Self {
        self.lock_memory = enabled;
        self
    }

    pub fn with_cpu_affinity(mut self, mask: u64) -> Self {
        self.cpu_affinity = Some(mask);
        self
    }

    pub fn has_rt_features(&self) -> bool {
        self.high_priority || self.lock_memory || self.cpu_affinity.is_some()
    }
}

/// Which parts of an [`RtSetup`] actually took effect.
///
/// Failures are not fatal (they usually mean a missing `CAP_SYS_NICE` or
/// `RLIMIT_MEMLOCK`); they only widen the jitter the calibrator has to absorb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtSetupReport {
    pub priority_applied: bool,
    pub memory_locked: bool,
    pub affinity_applied: bool,
}

/// Apply `setup` to the calling thread.
pub fn apply(setup: &RtSetup) -> RtSetupReport {
    crate::platform::apply_rt_setup(setup)
}
