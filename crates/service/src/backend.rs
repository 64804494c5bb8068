//! Where the daemon gets its devices, clocks and timers from.

use std::time::Duration;

use fx3pps_scheduler::{DeadlineTimer, RealtimeTimer, SystemClock, WallClock};
use fx3pps_transport::{DeviceInfo, PpsPort, TransportResult, UsbIds, UsbPort};

/// Device discovery and per-device resources.
///
/// Every attach gets a fresh clock and, for generators, a fresh timer.
pub trait DeviceBackend: Send + 'static {
    type Port: PpsPort + 'static;
    type Clock: WallClock + 'static;
    type Timer: DeadlineTimer + 'static;

    /// Boards currently present.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the bus cannot be listed.
    fn enumerate(&self) -> TransportResult<Vec<DeviceInfo>>;

    /// # Errors
    ///
    /// Returns the transport error if the board cannot be opened or claimed.
    fn open(&self, info: &DeviceInfo) -> TransportResult<Self::Port>;

    fn clock(&self) -> Self::Clock;

    fn timer(&self) -> Self::Timer;
}

/// Boards on the local USB bus, timed by `CLOCK_REALTIME`.
#[derive(Debug, Clone)]
pub struct UsbBackend {
    ids: UsbIds,
    write_timeout: Duration,
}

impl UsbBackend {
    pub fn new(ids: UsbIds, write_timeout: Duration) -> Self {
        Self { ids, write_timeout }
    }
}

impl DeviceBackend for UsbBackend {
    type Port = UsbPort;
    type Clock = SystemClock;
    type Timer = RealtimeTimer;

    fn enumerate(&self) -> TransportResult<Vec<DeviceInfo>> {
        fx3pps_transport::enumerate(&self.ids)
    }

    fn open(&self, info: &DeviceInfo) -> TransportResult<UsbPort> {
        UsbPort::open(info.clone(), self.write_timeout)
    }

    fn clock(&self) -> SystemClock {
        SystemClock
    }

    fn timer(&self) -> RealtimeTimer {
        RealtimeTimer::new()
    }
}
