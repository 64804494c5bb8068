//! Scripted PPS port.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use fx3pps_errors::{TransportError, TransportResult};
use fx3pps_scheduler::{WallClock, WallTime};
use fx3pps_transport::{DeviceInfo, DeviceKey, DeviceRole, PpsPort, SignalLevel, UsbIds};
use parking_lot::Mutex;

use crate::clock::SimClock;

/// One completed or failed write, as seen by the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub level: SignalLevel,
    /// Clock reading when the write was issued.
    pub requested: WallTime,
    /// Clock reading when the write returned.
    pub completed: WallTime,
    pub result: TransportResult,
}

/// Scripted outcome of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStep {
    /// Report `level` after `after_ns` of simulated waiting.
    Level { level: SignalLevel, after_ns: i64 },
    Fail(TransportError),
}

#[derive(Debug, Default)]
struct PortState {
    write_script: VecDeque<Result<i64, TransportError>>,
    reads: VecDeque<ReadStep>,
    writes: Vec<WriteRecord>,
}

/// A [`PpsPort`] driven by a script and a [`SimClock`].
///
/// Writes advance the clock by the next scripted duration, or by
/// `default_write_ns` once the script is empty. Reads pop the read queue; an empty
/// queue times out after a short real sleep. The write log and both scripts are
/// shared with every [`MockPortHandle`].
#[derive(Debug)]
pub struct MockPort {
    info: DeviceInfo,
    clock: SimClock,
    default_write_ns: i64,
    state: Arc<Mutex<PortState>>,
}

/// Test-side view of a [`MockPort`] that has been moved into a generator or receiver.
#[derive(Debug, Clone)]
pub struct MockPortHandle {
    state: Arc<Mutex<PortState>>,
}

impl MockPort {
    pub fn generator(clock: SimClock, default_write_ns: i64) -> Self {
        Self::with_role(DeviceRole::Generator, clock, default_write_ns)
    }

    pub fn receiver(clock: SimClock) -> Self {
        Self::with_role(DeviceRole::Receiver, clock, 0)
    }

    pub fn with_role(role: DeviceRole, clock: SimClock, default_write_ns: i64) -> Self {
        let ids = UsbIds::default();
        let info = DeviceInfo::new(ids.vendor_id, ids.product_id(role), DeviceKey::new(1, 7), role);
        Self::for_device(info, clock, default_write_ns)
    }

    /// Port for a specific device, e.g. one handed out by a fake enumerator.
    pub fn for_device(info: DeviceInfo, clock: SimClock, default_write_ns: i64) -> Self {
        Self {
            info,
            clock,
            default_write_ns,
            state: Arc::new(Mutex::new(PortState::default())),
        }
    }

    /// Queue write durations (ns).
    #[must_use]
    pub fn with_write_durations(self, durations: impl IntoIterator<Item = i64>) -> Self {
        self.state
            .lock()
            .write_script
            .extend(durations.into_iter().map(Ok));
        self
    }

    /// Queue a failing write.
    #[must_use]
    pub fn with_write_failure(self, err: TransportError) -> Self {
        self.state.lock().write_script.push_back(Err(err));
        self
    }

    #[must_use]
    pub fn with_reads(self, reads: impl IntoIterator<Item = ReadStep>) -> Self {
        self.state.lock().reads.extend(reads);
        self
    }

    pub fn handle(&self) -> MockPortHandle {
        MockPortHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl MockPortHandle {
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().writes.len()
    }

    pub fn push_write_duration(&self, ns: i64) {
        self.state.lock().write_script.push_back(Ok(ns));
    }

    pub fn push_write_failure(&self, err: TransportError) {
        self.state.lock().write_script.push_back(Err(err));
    }

    pub fn push_read(&self, step: ReadStep) {
        self.state.lock().reads.push_back(step);
    }

    pub fn pending_reads(&self) -> usize {
        self.state.lock().reads.len()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }
}

impl PpsPort for MockPort {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn write_level(&mut self, level: SignalLevel) -> TransportResult {
        let requested = self.clock.peek();
        let mut state = self.state.lock();
        let (duration, result) = match state.write_script.pop_front() {
            Some(Ok(ns)) => (ns, Ok(())),
            Some(Err(e)) => (self.default_write_ns, Err(e)),
            None => (self.default_write_ns, Ok(())),
        };
        self.clock.advance(duration);
        state.writes.push(WriteRecord {
            level,
            requested,
            completed: self.clock.peek(),
            result,
        });
        result
    }

    fn read_level(&mut self, timeout: Duration) -> TransportResult<SignalLevel> {
        let step = self.state.lock().reads.pop_front();
        match step {
            Some(ReadStep::Level { level, after_ns }) => {
                self.clock.advance(after_ns);
                Ok(level)
            }
            Some(ReadStep::Fail(e)) => Err(e),
            None => {
                std::thread::sleep(Duration::from_millis(1));
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                Err(TransportError::timeout(timeout_ms))
            }
        }
    }
}

/// Shorthand for a read reporting `level` after `after_ns`.
pub fn level_after(level: SignalLevel, after_ns: i64) -> ReadStep {
    ReadStep::Level { level, after_ns }
}
