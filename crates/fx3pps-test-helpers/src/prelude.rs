//! Convenience re-exports for common test utilities.

pub use crate::clock::SimClock;
pub use crate::must::{must, must_some, must_with, wait_for};
pub use crate::port::{MockPort, MockPortHandle, ReadStep, WriteRecord, level_after};
pub use crate::sink::RecordingSink;
pub use crate::timer::ScriptedTimer;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;
