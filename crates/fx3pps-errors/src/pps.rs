//! PPS publication errors.

/// Errors raised by a PPS sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PpsError {
    /// The sink refused to register the source
    #[error("Cannot register PPS source: {0}")]
    Registration(String),

    /// An event could not be delivered
    #[error("Cannot publish PPS event: {0}")]
    Publish(String),

    /// The handle does not name a registered source
    #[error("PPS source {0} is not registered")]
    NotRegistered(u32),
}

impl PpsError {
    /// Create a registration error.
    pub fn registration(msg: impl Into<String>) -> Self {
        PpsError::Registration(msg.into())
    }

    /// Create a publish error.
    pub fn publish(msg: impl Into<String>) -> Self {
        PpsError::Publish(msg.into())
    }
}
