//! Prelude module for convenient error handling imports.

pub use crate::{
    TransportResult,
    attach::AttachError,
    config::ConfigError,
    pps::PpsError,
    severity::ErrorSeverity,
    transport::TransportError,
};
