//! Receiver read loop.
//!
//! A receiver board reports the level of an external PPS line. The reader thread
//! alternates two blocking reads: a long one expecting the assert report and a
//! short one expecting the clear report. Each expected level is timestamped as soon
//! as the read returns and published; an unexpected level is logged and dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use fx3pps_errors::{AttachError, ConfigError, TransportError};
use fx3pps_scheduler::WallClock;
use fx3pps_transport::{DeviceInfo, EdgeKind, PpsPort, SignalLevel};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::capabilities::PpsSourceInfo;
use crate::event::{EdgeEvent, SourceId};
use crate::sink::PpsSink;

/// Receiver read timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Wait for the assert report (ms).
    pub assert_timeout_ms: u64,
    /// Wait for the clear report after an assert (ms).
    pub clear_timeout_ms: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            assert_timeout_ms: 1_500,
            clear_timeout_ms: 300,
        }
    }
}

impl ReceiverConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for a zero or over-long timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=60_000).contains(&self.assert_timeout_ms) {
            return Err(ConfigError::out_of_range(
                "assert_timeout_ms",
                self.assert_timeout_ms,
                1,
                60_000,
            ));
        }
        if !(1..=60_000).contains(&self.clear_timeout_ms) {
            return Err(ConfigError::out_of_range(
                "clear_timeout_ms",
                self.clear_timeout_ms,
                1,
                60_000,
            ));
        }
        Ok(())
    }

    pub fn assert_timeout(&self) -> Duration {
        Duration::from_millis(self.assert_timeout_ms)
    }

    pub fn clear_timeout(&self) -> Duration {
        Duration::from_millis(self.clear_timeout_ms)
    }
}

/// Live receiver counters.
#[derive(Debug, Default)]
pub struct ReceiverStats {
    asserts: AtomicU64,
    clears: AtomicU64,
    skipped: AtomicU64,
    timeouts: AtomicU64,
    errors: AtomicU64,
    publish_failures: AtomicU64,
}

/// Point-in-time copy of [`ReceiverStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReceiverSnapshot {
    pub asserts: u64,
    pub clears: u64,
    pub skipped: u64,
    pub timeouts: u64,
    pub errors: u64,
    pub publish_failures: u64,
}

impl ReceiverStats {
    #[must_use]
    pub fn snapshot(&self) -> ReceiverSnapshot {
        ReceiverSnapshot {
            asserts: self.asserts.load(Ordering::Relaxed),
            clears: self.clears.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}

/// An attached receiver with its reader thread running.
pub struct Receiver {
    info: DeviceInfo,
    source: SourceId,
    stop: Arc<AtomicBool>,
    stats: Arc<ReceiverStats>,
    sink: SharedSink,
    thread: Option<JoinHandle<()>>,
}

type SharedSink = Arc<Mutex<Box<dyn PpsSink>>>;

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("info", &self.info)
            .field("source", &self.source)
            .field("running", &self.thread.is_some())
            .finish_non_exhaustive()
    }
}

impl Receiver {
    /// Register a PPS source for `port` and start reading.
    ///
    /// # Errors
    ///
    /// - [`AttachError::Config`] if `config` does not validate
    /// - [`AttachError::PpsRegistration`] if the sink refused the source
    /// - [`AttachError::Spawn`] if the reader thread could not be started; the
    ///   source is unregistered again first
    pub fn attach<P, S, C>(
        port: P,
        mut sink: S,
        clock: C,
        config: ReceiverConfig,
    ) -> Result<Self, AttachError>
    where
        P: PpsPort + 'static,
        S: PpsSink + 'static,
        C: WallClock + 'static,
    {
        config.validate()?;
        let info = port.info().clone();
        let source = sink.register_source(&PpsSourceInfo::receiver(info.key))?;

        let boxed: Box<dyn PpsSink> = Box::new(sink);
        let sink: SharedSink = Arc::new(Mutex::new(boxed));
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(ReceiverStats::default());
        let reader = ReadLoop {
            port,
            sink: Arc::clone(&sink),
            clock,
            config,
            source,
            stop: Arc::clone(&stop),
            stats: Arc::clone(&stats),
            assert_seq: 0,
            clear_seq: 0,
        };

        let spawned = std::thread::Builder::new()
            .name(format!("fx3pps-recv-{}", info.key))
            .spawn(move || reader.run());
        let thread = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                unregister(&sink, source, &info);
                return Err(AttachError::spawn(&e));
            }
        };

        info!(device = %info.key, source = %source, "Receiver attached");
        Ok(Self {
            info,
            source,
            stop,
            stats,
            sink,
            thread: Some(thread),
        })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn stats(&self) -> Arc<ReceiverStats> {
        Arc::clone(&self.stats)
    }

    pub fn snapshot(&self) -> ReceiverSnapshot {
        self.stats.snapshot()
    }

    /// Stop the reader, join it, then unregister the PPS source.
    ///
    /// Returns within one read timeout.
    pub fn detach(mut self) -> ReceiverSnapshot {
        self.shutdown();
        self.stats.snapshot()
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);
        if thread.join().is_err() {
            error!(device = %self.info.key, "Receiver thread panicked");
        }
        unregister(&self.sink, self.source, &self.info);
        info!(device = %self.info.key, "Receiver detached");
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn unregister(sink: &SharedSink, source: SourceId, info: &DeviceInfo) {
    if let Err(e) = sink.lock().unregister_source(source) {
        warn!(device = %info.key, error = %e, "Cannot unregister PPS source");
    }
}

struct ReadLoop<P, C> {
    port: P,
    sink: SharedSink,
    clock: C,
    config: ReceiverConfig,
    source: SourceId,
    stop: Arc<AtomicBool>,
    stats: Arc<ReceiverStats>,
    assert_seq: u64,
    clear_seq: u64,
}

impl<P: PpsPort, C: WallClock> ReadLoop<P, C> {
    fn run(mut self) {
        debug!(device = %self.port.info().key, "Receiver loop started");
        while !self.stopped() {
            if !self.read_edge(EdgeKind::Assert, self.config.assert_timeout()) {
                break;
            }
            if self.stopped() {
                break;
            }
            if !self.read_edge(EdgeKind::Clear, self.config.clear_timeout()) {
                break;
            }
        }
        debug!(device = %self.port.info().key, "Receiver loop stopped");
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// One read expecting `expected`. Returns `false` once the device is gone.
    fn read_edge(&mut self, expected: EdgeKind, timeout: Duration) -> bool {
        match self.port.read_level(timeout) {
            Ok(level) if level == expected.level() => {
                let timestamp = self.clock.now();
                self.publish(expected, timestamp);
            }
            Ok(level) => {
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                let unexpected = match level {
                    SignalLevel::High => EdgeKind::Assert,
                    SignalLevel::Low => EdgeKind::Clear,
                };
                info!(
                    device = %self.port.info().key,
                    waiting_for = %expected,
                    "Skip {unexpected} event"
                );
            }
            Err(e) => return self.read_failed(expected, &e),
        }
        true
    }

    fn publish(&mut self, kind: EdgeKind, timestamp: fx3pps_scheduler::WallTime) {
        let sequence = match kind {
            EdgeKind::Assert => {
                self.stats.asserts.fetch_add(1, Ordering::Relaxed);
                self.assert_seq += 1;
                self.assert_seq
            }
            EdgeKind::Clear => {
                self.stats.clears.fetch_add(1, Ordering::Relaxed);
                self.clear_seq += 1;
                self.clear_seq
            }
        };
        let event = EdgeEvent::new(timestamp, kind, sequence);
        let published = self.sink.lock().publish(self.source, &event);
        if let Err(e) = published {
            self.stats.publish_failures.fetch_add(1, Ordering::Relaxed);
            warn!(device = %self.port.info().key, event = %event, error = %e, "PPS publish failed");
        }
    }

    fn read_failed(&mut self, expected: EdgeKind, err: &TransportError) -> bool {
        let device = self.port.info().key;
        if err.is_timeout() {
            self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
            warn!(%device, edge = %expected, error = %err, "Capture timeout");
            return true;
        }
        self.stats.errors.fetch_add(1, Ordering::Relaxed);
        error!(
            %device,
            edge = %expected,
            code = err.code().unwrap_or(0),
            error = %err,
            "Capture missed"
        );
        !err.is_device_unavailable()
    }
}
