//! USB transport error types.
//!
//! The edge scheduler treats every variant the same way (skip the edge, keep the
//! loop running), but logs distinguish a slow-but-reachable device
//! ([`TransportError::Timeout`]) from one that rejected the transfer.

use crate::severity::ErrorSeverity;

/// Errors reported by a USB bulk transfer or by opening a port.
///
/// All variants are `Copy` so they can be produced and logged on the RT path
/// without allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum TransportError {
    /// The transfer did not complete before its timeout
    #[error("Transfer timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// The host stack or device rejected the transfer
    #[error("Transfer rejected with code {code}: {message}")]
    Rejected {
        /// Native error code reported by the USB stack
        code: i32,
        /// Static description of the code
        message: &'static str,
    },

    /// The device went away
    #[error("Device disconnected")]
    Disconnected,

    /// Fewer bytes were transferred than required
    #[error("Short transfer: expected {expected} bytes, got {actual}")]
    ShortTransfer {
        /// Expected byte count
        expected: usize,
        /// Actual byte count
        actual: usize,
    },

    /// No device matched the requested identity
    #[error("Device not found: vendor={vendor_id:#06x}, product={product_id:#06x}")]
    NotFound {
        /// USB vendor ID
        vendor_id: u16,
        /// USB product ID
        product_id: u16,
    },

    /// The interface is claimed by someone else
    #[error("Device is busy")]
    Busy,

    /// Insufficient permissions to open the device
    #[error("Permission denied")]
    PermissionDenied,

    /// Local I/O failure
    #[error("I/O error: {0:?}")]
    Io(std::io::ErrorKind),
}

impl TransportError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TransportError::Timeout { .. } => ErrorSeverity::Warning,
            TransportError::Rejected { .. } => ErrorSeverity::Error,
            TransportError::Disconnected => ErrorSeverity::Critical,
            TransportError::ShortTransfer { .. } => ErrorSeverity::Warning,
            TransportError::NotFound { .. } => ErrorSeverity::Error,
            TransportError::Busy => ErrorSeverity::Warning,
            TransportError::PermissionDenied => ErrorSeverity::Error,
            TransportError::Io(_) => ErrorSeverity::Error,
        }
    }

    /// Check if the transport was reachable but too slow.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }

    /// Check if this error indicates the device is unavailable.
    pub fn is_device_unavailable(&self) -> bool {
        matches!(
            self,
            TransportError::Disconnected
                | TransportError::NotFound { .. }
                | TransportError::PermissionDenied
        )
    }

    /// Native error code, if the stack reported one.
    pub fn code(&self) -> Option<i32> {
        match self {
            TransportError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Create a timeout error.
    pub fn timeout(timeout_ms: u64) -> Self {
        TransportError::Timeout { timeout_ms }
    }

    /// Create a rejection error.
    pub fn rejected(code: i32, message: &'static str) -> Self {
        TransportError::Rejected { code, message }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e.kind())
    }
}
