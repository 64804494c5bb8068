//! PPS source capabilities.
//!
//! Bit values follow `linux/pps.h` so the set can be handed to the kernel API
//! unchanged.

use bitflags::bitflags;
use fx3pps_transport::DeviceKey;

bitflags! {
    /// Mode bits a PPS source advertises or enables.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PpsCapabilities: u32 {
        /// Capture assert events
        const CAPTUREASSERT = 0x01;
        /// Capture clear events
        const CAPTURECLEAR  = 0x02;
        /// Capture both edges
        const CAPTUREBOTH   = 0x03;

        /// Apply the assert offset compensation
        const OFFSETASSERT  = 0x10;
        /// Apply the clear offset compensation
        const OFFSETCLEAR   = 0x20;

        /// Echo assert events on an auxiliary output
        const ECHOASSERT    = 0x40;
        /// Echo clear events on an auxiliary output
        const ECHOCLEAR     = 0x80;

        /// Consumers may block waiting for the next event
        const CANWAIT       = 0x100;

        /// Timestamps are `timespec` (nanosecond resolution)
        const TSFMT_TSPEC   = 0x1000;
    }
}

impl PpsCapabilities {
    /// Everything an FX3 receiver advertises.
    pub const RECEIVER_MODE: Self = Self::CAPTUREBOTH
        .union(Self::OFFSETASSERT)
        .union(Self::OFFSETCLEAR)
        .union(Self::ECHOASSERT)
        .union(Self::ECHOCLEAR)
        .union(Self::CANWAIT)
        .union(Self::TSFMT_TSPEC);

    /// What an FX3 receiver enables by default.
    pub const RECEIVER_DEFAULTS: Self = Self::CAPTUREBOTH
        .union(Self::OFFSETASSERT)
        .union(Self::OFFSETCLEAR);
}

/// Registration request for one PPS source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpsSourceInfo {
    pub name: String,
    pub device: DeviceKey,
    /// Advertised capabilities.
    pub mode: PpsCapabilities,
    /// Capabilities enabled at registration.
    pub default_params: PpsCapabilities,
}

impl PpsSourceInfo {
    /// Source description of an FX3 receiver at `device`.
    pub fn receiver(device: DeviceKey) -> Self {
        Self {
            name: format!("fx3pps-{device}"),
            device,
            mode: PpsCapabilities::RECEIVER_MODE,
            default_params: PpsCapabilities::RECEIVER_DEFAULTS,
        }
    }
}
