//! Shared test utilities for the FX3 PPS workspace.
//!
//! # Modules
//!
//! - [`mod@must`] - Unwrap helpers with good error messages and `#[track_caller]`
//! - [`clock`] - [`SimClock`], a deterministic wall clock
//! - [`timer`] - [`ScriptedTimer`], a deadline timer that fires on the simulated clock
//! - [`port`] - [`MockPort`], a scripted PPS port
//! - [`sink`] - [`RecordingSink`], a PPS sink that records everything
//! - [`prelude`] - Convenience re-exports
//!
//! # Usage
//!
//! ```rust,ignore
//! use fx3pps_test_helpers::prelude::*;
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::unwrap_used, clippy::panic)]

pub mod clock;
pub mod must;
pub mod port;
pub mod prelude;
pub mod sink;
pub mod timer;

pub use clock::SimClock;
pub use must::*;
pub use port::{MockPort, MockPortHandle, ReadStep, WriteRecord, level_after};
pub use sink::RecordingSink;
pub use timer::ScriptedTimer;
