//! PPS publication sinks.

use std::collections::BTreeMap;

use fx3pps_errors::PpsError;
use tracing::info;

use crate::capabilities::PpsSourceInfo;
use crate::event::{EdgeEvent, SourceId};

/// Consumer of PPS edge events.
///
/// A source is registered once per receiver, then receives events until it is
/// unregistered.
pub trait PpsSink: Send {
    /// # Errors
    ///
    /// Returns [`PpsError::Registration`] if the source cannot be registered.
    fn register_source(&mut self, info: &PpsSourceInfo) -> Result<SourceId, PpsError>;

    /// # Errors
    ///
    /// Returns [`PpsError::NotRegistered`] for an unknown source, or
    /// [`PpsError::Publish`] if delivery failed.
    fn publish(&mut self, source: SourceId, event: &EdgeEvent) -> Result<(), PpsError>;

    /// # Errors
    ///
    /// Returns [`PpsError::NotRegistered`] for an unknown source.
    fn unregister_source(&mut self, source: SourceId) -> Result<(), PpsError>;
}

impl<S: PpsSink + ?Sized> PpsSink for Box<S> {
    fn register_source(&mut self, info: &PpsSourceInfo) -> Result<SourceId, PpsError> {
        (**self).register_source(info)
    }

    fn publish(&mut self, source: SourceId, event: &EdgeEvent) -> Result<(), PpsError> {
        (**self).publish(source, event)
    }

    fn unregister_source(&mut self, source: SourceId) -> Result<(), PpsError> {
        (**self).unregister_source(source)
    }
}

/// Source table shared by the built-in sinks.
#[derive(Debug, Default)]
pub(crate) struct SourceTable {
    next_id: u32,
    sources: BTreeMap<SourceId, PpsSourceInfo>,
}

impl SourceTable {
    pub(crate) fn insert(&mut self, info: &PpsSourceInfo) -> SourceId {
        let id = SourceId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.sources.insert(id, info.clone());
        id
    }

    pub(crate) fn get(&self, id: SourceId) -> Result<&PpsSourceInfo, PpsError> {
        self.sources.get(&id).ok_or(PpsError::NotRegistered(id.0))
    }

    pub(crate) fn remove(&mut self, id: SourceId) -> Result<PpsSourceInfo, PpsError> {
        self.sources.remove(&id).ok_or(PpsError::NotRegistered(id.0))
    }
}

/// Logs every event through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink {
    table: SourceTable,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PpsSink for LogSink {
    fn register_source(&mut self, info: &PpsSourceInfo) -> Result<SourceId, PpsError> {
        let id = self.table.insert(info);
        info!(
            source = %id,
            name = %info.name,
            mode = format_args!("{:#x}", info.mode.bits()),
            "PPS source registered"
        );
        Ok(id)
    }

    fn publish(&mut self, source: SourceId, event: &EdgeEvent) -> Result<(), PpsError> {
        let info = self.table.get(source)?;
        info!(
            source = %source,
            device = %info.device,
            edge = %event.kind,
            sequence = event.sequence,
            timestamp = %event.timestamp,
            offset_ns = event.second_offset_ns(),
            "PPS event"
        );
        Ok(())
    }

    fn unregister_source(&mut self, source: SourceId) -> Result<(), PpsError> {
        let info = self.table.remove(source)?;
        info!(source = %source, name = %info.name, "PPS source unregistered");
        Ok(())
    }
}
