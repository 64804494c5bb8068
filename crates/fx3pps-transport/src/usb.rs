//! libusb-backed port

use std::time::Duration;

use rusb::{DeviceHandle, GlobalContext, UsbContext};
use tracing::{debug, info, warn};

use crate::wire::{MAX_PACKET_SIZE, decode_level, encode_level};
use crate::{
    BULK_EP_IN, BULK_EP_OUT, DeviceInfo, DeviceKey, INTERFACE, PpsPort, SignalLevel,
    TransportError, TransportResult, UsbIds,
};

/// List the PPS boards currently on the bus.
///
/// # Errors
///
/// Returns an error if the device list cannot be read.
pub fn enumerate(ids: &UsbIds) -> TransportResult<Vec<DeviceInfo>> {
    let devices = rusb::devices().map_err(|e| map_usb_error(e, Duration::ZERO))?;
    let mut found = Vec::new();

    for device in devices.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                debug!(error = %e, "Skipping device without descriptor");
                continue;
            }
        };
        let vendor_id = descriptor.vendor_id();
        let product_id = descriptor.product_id();

        if let Some(role) = ids.role_of(vendor_id, product_id) {
            let key = DeviceKey::new(device.bus_number(), device.address());
            found.push(DeviceInfo::new(vendor_id, product_id, key, role));
        }
    }

    Ok(found)
}

/// Port to one board over libusb bulk transfers.
pub struct UsbPort {
    handle: DeviceHandle<GlobalContext>,
    info: DeviceInfo,
    write_timeout: Duration,
    packet: [u8; MAX_PACKET_SIZE],
}

impl UsbPort {
    /// Open the board described by `info` and claim its interface.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotFound`] if the device is no longer present, or the
    /// mapped libusb error if it cannot be opened or claimed.
    pub fn open(info: DeviceInfo, write_timeout: Duration) -> TransportResult<Self> {
        let devices = GlobalContext::default()
            .devices()
            .map_err(|e| map_usb_error(e, Duration::ZERO))?;

        let device = devices
            .iter()
            .find(|d| d.bus_number() == info.key.bus && d.address() == info.key.address)
            .ok_or(TransportError::NotFound {
                vendor_id: info.vendor_id,
                product_id: info.product_id,
            })?;

        let mut handle = device
            .open()
            .map_err(|e| map_usb_error(e, Duration::ZERO))?;

        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            debug!(device = %info.key, error = %e, "Kernel driver auto-detach unavailable");
        }
        handle
            .claim_interface(INTERFACE)
            .map_err(|e| map_usb_error(e, Duration::ZERO))?;

        info!(device = %info.key, role = %info.role, "Opened PPS board");

        Ok(Self {
            handle,
            info,
            write_timeout,
            packet: [0; MAX_PACKET_SIZE],
        })
    }
}

impl PpsPort for UsbPort {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn write_level(&mut self, level: SignalLevel) -> TransportResult {
        encode_level(level, &mut self.packet);
        let written = self
            .handle
            .write_bulk(BULK_EP_OUT, &self.packet, self.write_timeout)
            .map_err(|e| map_usb_error(e, self.write_timeout))?;

        if written < MAX_PACKET_SIZE {
            return Err(TransportError::ShortTransfer {
                expected: MAX_PACKET_SIZE,
                actual: written,
            });
        }
        Ok(())
    }

    fn read_level(&mut self, timeout: Duration) -> TransportResult<SignalLevel> {
        let mut buf = [0u8; MAX_PACKET_SIZE];
        let read = self
            .handle
            .read_bulk(BULK_EP_IN, &mut buf, timeout)
            .map_err(|e| map_usb_error(e, timeout))?;

        decode_level(buf.get(..read).unwrap_or(&[]))
    }
}

impl Drop for UsbPort {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(INTERFACE) {
            warn!(device = %self.info.key, error = %e, "Failed to release interface");
        }
    }
}

/// Map a libusb error onto the transport taxonomy.
///
/// Codes follow `libusb_error` so logs match libusb's own numbering.
pub fn map_usb_error(error: rusb::Error, timeout: Duration) -> TransportError {
    match error {
        rusb::Error::Timeout => {
            TransportError::timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
        }
        rusb::Error::NoDevice => TransportError::Disconnected,
        rusb::Error::Access => TransportError::PermissionDenied,
        rusb::Error::Busy => TransportError::Busy,
        rusb::Error::Io => TransportError::rejected(-1, "Input/Output Error"),
        rusb::Error::InvalidParam => TransportError::rejected(-2, "Invalid parameter"),
        rusb::Error::NotFound => TransportError::rejected(-5, "Entity not found"),
        rusb::Error::Overflow => TransportError::rejected(-8, "Overflow"),
        rusb::Error::Pipe => TransportError::rejected(-9, "Pipe error"),
        rusb::Error::Interrupted => TransportError::rejected(-10, "System call interrupted"),
        rusb::Error::NoMem => TransportError::rejected(-11, "Insufficient memory"),
        rusb::Error::NotSupported => TransportError::rejected(-12, "Operation not supported"),
        _ => TransportError::rejected(-99, "Other error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_keeps_duration() {
        let err = map_usb_error(rusb::Error::Timeout, Duration::from_millis(1500));
        assert_eq!(err, TransportError::timeout(1500));
    }

    #[test]
    fn test_hard_errors_carry_libusb_codes() {
        assert_eq!(map_usb_error(rusb::Error::Pipe, Duration::ZERO).code(), Some(-9));
        assert_eq!(map_usb_error(rusb::Error::Io, Duration::ZERO).code(), Some(-1));
        assert_eq!(
            map_usb_error(rusb::Error::NoDevice, Duration::ZERO),
            TransportError::Disconnected
        );
    }
}
