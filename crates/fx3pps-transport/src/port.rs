//! Transport port trait

use std::time::Duration;

use crate::{DeviceInfo, SignalLevel, TransportResult};

/// A blocking, single-byte transport to one PPS board.
///
/// Writes return once the transfer has completed (or failed); the caller measures
/// how long that took against its own clock. Reads block for at most `timeout`.
pub trait PpsPort: Send {
    fn info(&self) -> &DeviceInfo;

    /// Drive the board's output to `level`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`](crate::TransportError) if the transfer fails or times out.
    fn write_level(&mut self, level: SignalLevel) -> TransportResult;

    /// Wait for the next level report from the board.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Timeout`](crate::TransportError::Timeout) if nothing
    /// arrived within `timeout`, or another error if the transfer failed.
    fn read_level(&mut self, timeout: Duration) -> TransportResult<SignalLevel>;
}

impl<P: PpsPort + ?Sized> PpsPort for Box<P> {
    fn info(&self) -> &DeviceInfo {
        (**self).info()
    }

    fn write_level(&mut self, level: SignalLevel) -> TransportResult {
        (**self).write_level(level)
    }

    fn read_level(&mut self, timeout: Duration) -> TransportResult<SignalLevel> {
        (**self).read_level(timeout)
    }
}
