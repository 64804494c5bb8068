//! fx3ppsd: the FX3 PPS service daemon
//!
//! Periodically scans the USB bus, attaches a [`Generator`](fx3pps_scheduler::Generator)
//! to every generator board and a [`Receiver`](fx3pps_pps::Receiver) to every
//! receiver board, and detaches boards that disappear. Receiver edges go to
//! chronyd's SOCK refclock when a socket is configured.

#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod logging;

pub use backend::{DeviceBackend, UsbBackend};
pub use cli::{Cli, RoleArg};
pub use config::ServiceConfig;
pub use daemon::{AttachedDevice, Daemon, DeviceManager, DeviceStatus, ScanReport, shutdown_signal};
