//! PPS publication for FX3 receiver boards
//!
//! - [`capabilities`]: PPS mode bits and source registration info
//! - [`event`]: timestamped edge events
//! - [`sink`]: the [`PpsSink`] trait and the logging sink
//! - `chrony`: a sink feeding chronyd's SOCK refclock (unix only)
//! - [`receiver`]: the reader thread that turns board reports into events
//!
//! # Example
//!
//! ```no_run
//! use fx3pps_pps::{LogSink, Receiver, ReceiverConfig};
//! use fx3pps_scheduler::SystemClock;
//! use fx3pps_transport::PpsPort;
//!
//! fn listen(port: impl PpsPort + 'static) -> Result<(), fx3pps_errors::AttachError> {
//!     let receiver = Receiver::attach(port, LogSink::new(), SystemClock, ReceiverConfig::default())?;
//!     std::thread::sleep(std::time::Duration::from_secs(10));
//!     let stats = receiver.detach();
//!     println!("{} asserts", stats.asserts);
//!     Ok(())
//! }
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod capabilities;
pub mod event;
pub mod prelude;
pub mod receiver;
pub mod sink;

#[cfg(unix)]
pub mod chrony;

pub use capabilities::{PpsCapabilities, PpsSourceInfo};
pub use event::{EdgeEvent, SourceId};
pub use receiver::{Receiver, ReceiverConfig, ReceiverSnapshot, ReceiverStats};
pub use sink::{LogSink, PpsSink};

#[cfg(unix)]
pub use chrony::{ChronySockSink, SockSample};

pub use fx3pps_errors::PpsError;
