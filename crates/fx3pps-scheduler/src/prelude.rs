//! Prelude module for common scheduler types.

pub use crate::calibrator::LatencyCalibrator;
pub use crate::clock::{SystemClock, WallClock, WallTime};
pub use crate::config::GeneratorConfig;
pub use crate::edge::{CycleOutcome, CycleReport, EdgeScheduler};
pub use crate::generator::{Generator, GeneratorSnapshot};
pub use crate::rt_setup::RtSetup;
pub use crate::timer::{DeadlineTimer, RealtimeTimer, TimerWait};
pub use crate::{NSEC_PER_SEC, SAFETY_MARGIN_NS};
