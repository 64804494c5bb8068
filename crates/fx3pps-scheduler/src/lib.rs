//! Self-calibrating PPS edge scheduling for FX3 generator boards.
//!
//! Once per wall-clock second the generator must raise its output at
//! `1s - send_delay` and drop it at the second boundary. The only way to touch the
//! line is a USB bulk write of unknown, varying latency, and the only way to get
//! woken up is a timer that fires a little late by an unknown, varying amount.
//! This crate closes that loop:
//!
//! - **[`LatencyCalibrator`]**: smoothed estimates of write time and timer error
//! - **[`EdgeScheduler`]**: the per-second callback that busy-waits to each edge,
//!   writes it, and reprograms its own next deadline from the estimates
//! - **[`Generator`]**: bring-up (warm-up calibration, first deadline, timer
//!   thread) and teardown (cancel and join before the state is released)
//! - **[`WallClock`] / [`DeadlineTimer`]**: the clock and timer seams, with
//!   `CLOCK_REALTIME` implementations for Linux
//! - **[`RtSetup`]**: real-time thread configuration for the timer thread
//!
//! # RT-Safety Guarantees
//!
//! - **No heap allocations** in [`EdgeScheduler::on_timer_fire`] once the
//!   statistics ring buffer has filled
//! - **Bounded busy-wait**: every spin ends at its target offset, at the second
//!   boundary, or at the configured hold cap, whichever comes first
//! - **Single writer**: all calibration state is owned by the timer thread
//!
//! # Example
//!
//! ```no_run
//! use fx3pps_errors::AttachError;
//! use fx3pps_scheduler::{Generator, GeneratorConfig, RealtimeTimer, SystemClock};
//! use fx3pps_transport::PpsPort;
//! use std::time::Duration;
//!
//! fn run_for_a_while(port: impl PpsPort + 'static) -> Result<(), AttachError> {
//!     let generator = Generator::attach(
//!         port,
//!         SystemClock,
//!         RealtimeTimer::new(),
//!         GeneratorConfig::default(),
//!     )?;
//!     std::thread::sleep(Duration::from_secs(10));
//!     let status = generator.detach();
//!     println!("{status:?}");
//!     Ok(())
//! }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]

pub mod calibrator;
pub mod clock;
pub mod config;
pub mod edge;
pub mod generator;
pub mod rt_setup;
pub mod spin;
pub mod stats;
pub mod timer;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(not(target_os = "linux"))]
mod fallback;

pub mod prelude;

pub use calibrator::{LatencyCalibrator, WarmUpReport};
pub use clock::{SystemClock, WallClock, WallTime};
pub use config::GeneratorConfig;
pub use edge::{CycleOutcome, CycleReport, EdgeScheduler, EdgeTiming};
pub use generator::{Generator, GeneratorSnapshot, GeneratorStatus};
pub use rt_setup::{RtSetup, RtSetupReport};
pub use spin::{SpinOutcome, spin_until};
pub use stats::CycleStats;
pub use timer::{CancelSignal, DeadlineTimer, RealtimeTimer, TimerCanceller, TimerWait, cancel_pair};

/// Nanoseconds per second.
pub const NSEC_PER_SEC: i64 = 1_000_000_000;

/// Extra lead time subtracted from every deadline (ns).
pub const SAFETY_MARGIN_NS: i64 = 3_000;

/// Largest accepted assert-to-clear separation (ns).
pub const SEND_DELAY_MAX_NS: u64 = 100_000_000;

/// Default assert-to-clear separation (ns).
pub const DEFAULT_SEND_DELAY_NS: u64 = 100_000_000;

/// Default number of timed writes used to seed the write-time estimate.
pub const DEFAULT_WARMUP_SAMPLES: u32 = 32;

/// Write-time seed used when warm-up calibration is disabled (ns).
pub const DEFAULT_INITIAL_WRITE_TIME_NS: u64 = 10_000;

/// Default cap on the time one callback may spend busy-waiting (ns).
pub const DEFAULT_MAX_HOLD_NS: u64 = 250_000_000;

pub(crate) mod platform {
    #[cfg(not(target_os = "linux"))]
    pub use crate::fallback::*;
    #[cfg(target_os = "linux")]
    pub use crate::linux::*;
}
