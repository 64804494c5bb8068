//! Recording PPS sink.

use std::sync::Arc;

use fx3pps_errors::PpsError;
use fx3pps_pps::{EdgeEvent, PpsSink, PpsSourceInfo, SourceId};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Recorded {
    registered: Vec<(SourceId, PpsSourceInfo)>,
    unregistered: Vec<SourceId>,
    events: Vec<(SourceId, EdgeEvent)>,
    fail_registration: bool,
    fail_publish: bool,
}

/// A [`PpsSink`] that keeps everything it is given.
///
/// Clones share the same record, so a test can keep one after handing the other
/// to a receiver.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that refuses every registration.
    pub fn refusing() -> Self {
        let sink = Self::new();
        sink.inner.lock().fail_registration = true;
        sink
    }

    /// Make every later publish fail (or succeed again).
    pub fn set_fail_publish(&self, fail: bool) {
        self.inner.lock().fail_publish = fail;
    }

    pub fn events(&self) -> Vec<EdgeEvent> {
        self.inner.lock().events.iter().map(|(_, e)| *e).collect()
    }

    pub fn event_count(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn registered(&self) -> Vec<(SourceId, PpsSourceInfo)> {
        self.inner.lock().registered.clone()
    }

    pub fn unregistered(&self) -> Vec<SourceId> {
        self.inner.lock().unregistered.clone()
    }
}

impl PpsSink for RecordingSink {
    fn register_source(&mut self, info: &PpsSourceInfo) -> Result<SourceId, PpsError> {
        let mut inner = self.inner.lock();
        if inner.fail_registration {
            return Err(PpsError::registration("refused by test sink"));
        }
        let id = SourceId(u32::try_from(inner.registered.len()).unwrap_or(u32::MAX));
        inner.registered.push((id, info.clone()));
        Ok(id)
    }

    fn publish(&mut self, source: SourceId, event: &EdgeEvent) -> Result<(), PpsError> {
        let mut inner = self.inner.lock();
        if inner.fail_publish {
            return Err(PpsError::publish("refused by test sink"));
        }
        inner.events.push((source, *event));
        Ok(())
    }

    fn unregister_source(&mut self, source: SourceId) -> Result<(), PpsError> {
        self.inner.lock().unregistered.push(source);
        Ok(())
    }
}
