//! Device bring-up errors.
//!
//! An attach either completes fully or fails with one of these errors and leaves
//! no partial state behind.

use crate::severity::ErrorSeverity;
use crate::{ConfigError, PpsError, TransportError};

/// Errors that abort the attach of a generator or receiver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttachError {
    /// Opening or claiming the device failed
    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),

    /// Every warm-up write failed, so no write-time estimate could be seeded
    #[error("Write-time calibration failed: all {attempted} warm-up writes failed")]
    Calibration {
        /// Number of warm-up writes attempted
        attempted: u32,
    },

    /// The supplied configuration is invalid
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The worker thread could not be started
    #[error("Cannot start worker thread: {0}")]
    Spawn(String),

    /// The device already has an attached instance
    #[error("Device {0} is already attached")]
    AlreadyAttached(String),

    /// PPS source registration failed
    #[error("PPS registration failed: {0}")]
    PpsRegistration(#[from] PpsError),
}

impl AttachError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AttachError::Transport(e) => e.severity(),
            AttachError::Calibration { .. } => ErrorSeverity::Error,
            AttachError::Config(_) => ErrorSeverity::Error,
            AttachError::Spawn(_) => ErrorSeverity::Critical,
            AttachError::AlreadyAttached(_) => ErrorSeverity::Info,
            AttachError::PpsRegistration(_) => ErrorSeverity::Error,
        }
    }

    /// Check if a later attach attempt of the same device may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AttachError::Transport(e) => !matches!(e, TransportError::PermissionDenied),
            AttachError::Calibration { .. } => true,
            AttachError::Config(_) => false,
            AttachError::Spawn(_) => true,
            AttachError::AlreadyAttached(_) => false,
            AttachError::PpsRegistration(_) => true,
        }
    }

    /// Create a thread spawn error.
    pub fn spawn(err: &std::io::Error) -> Self {
        AttachError::Spawn(err.to_string())
    }
}
