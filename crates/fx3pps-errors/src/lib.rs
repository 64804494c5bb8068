//! Error types for the FX3 PPS workspace
//!
//! Every crate in the workspace reports failures through the types defined here,
//! so the daemon can grade and log them uniformly.
//!
//! # Architecture
//!
//! - [`severity`]: Severity levels used when logging failures
//! - [`transport`]: USB transfer failures (timeouts versus hard rejections)
//! - [`config`]: Configuration validation failures
//! - [`attach`]: Bring-up failures of a generator or receiver
//! - [`pps`]: PPS publication failures
//!
//! # RT Safety
//!
//! The variants produced on the edge-scheduling path (`Timeout`, `Disconnected`,
//! `ShortTransfer`, `Rejected` with a static message) carry no owned strings, so
//! reporting them never allocates.
//!
//! # Example
//!
//! ```
//! use fx3pps_errors::prelude::*;
//!
//! fn check_delay(send_delay_ns: u64) -> Result<u64, ConfigError> {
//!     if send_delay_ns > 100_000_000 {
//!         return Err(ConfigError::out_of_range("send_delay_ns", send_delay_ns, 0, 100_000_000));
//!     }
//!     Ok(send_delay_ns)
//! }
//!
//! assert!(check_delay(30_000).is_ok());
//! assert!(check_delay(500_000_000).is_err());
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod attach;
pub mod config;
pub mod pps;
pub mod prelude;
pub mod severity;
pub mod transport;

pub use attach::AttachError;
pub use config::ConfigError;
pub use pps::PpsError;
pub use severity::ErrorSeverity;
pub use transport::TransportError;

/// A specialized `Result` type for transport operations on the RT path.
pub type TransportResult<T = ()> = std::result::Result<T, TransportError>;
