//! USB transport for FX3-based PPS boards
//!
//! The board speaks a deliberately tiny protocol: every bulk transfer carries one
//! meaningful byte, nonzero for signal-high and zero for signal-low, padded to the
//! endpoint's maximum packet size. This crate provides:
//!
//! - [`device_info`]: vendor/product identity and the generator/receiver roles
//! - [`wire`]: packet encoding and decoding
//! - [`port`]: the [`PpsPort`] trait consumed by the scheduler and the receiver
//! - `usb`: the libusb-backed [`UsbPort`] (feature `usb`)

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod device_info;
pub mod port;
pub mod wire;

#[cfg(feature = "usb")]
pub mod usb;

pub use device_info::{DeviceInfo, DeviceKey, DeviceRole, UsbIds};
pub use port::PpsPort;
pub use wire::{EdgeKind, MAX_PACKET_SIZE, SignalLevel};

#[cfg(feature = "usb")]
pub use usb::{UsbPort, enumerate};

pub use fx3pps_errors::{TransportError, TransportResult};

/// Bulk OUT endpoint used to drive the output signal.
pub const BULK_EP_OUT: u8 = 0x01;

/// Bulk IN endpoint carrying observed signal levels.
pub const BULK_EP_IN: u8 = 0x81;

/// Interface claimed on the board.
pub const INTERFACE: u8 = 0;
