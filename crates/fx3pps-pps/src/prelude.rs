//! Prelude module for common PPS types.

pub use crate::{
    EdgeEvent, LogSink, PpsCapabilities, PpsError, PpsSink, PpsSourceInfo, Receiver,
    ReceiverConfig, SourceId,
};

#[cfg(unix)]
pub use crate::ChronySockSink;
