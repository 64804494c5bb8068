//! chrony SOCK refclock sink.
//!
//! chronyd reads `struct sock_sample` datagrams from the socket configured with
//! `refclock SOCK <path>`. Each assert edge becomes one sample whose offset is the
//! distance from the edge to the nearest whole second; chronyd pairs it with its
//! own notion of the second. Clear edges carry no timing information for chrony
//! and are dropped.

use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use fx3pps_errors::PpsError;
use fx3pps_scheduler::{NSEC_PER_SEC, WallTime};
use fx3pps_transport::EdgeKind;
use tracing::{debug, info, warn};

use crate::capabilities::PpsSourceInfo;
use crate::event::{EdgeEvent, SourceId};
use crate::sink::{PpsSink, SourceTable};

/// `SOCK_MAGIC` from chrony's `refclock_sock.c`.
pub const SOCK_MAGIC: i32 = 0x534f_434b;

/// Size of one encoded sample.
pub const SOCK_SAMPLE_LEN: usize = 40;

/// One chrony SOCK refclock sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SockSample {
    pub tv_sec: i64,
    pub tv_usec: i64,
    /// Seconds to add to the local timestamp to get true time.
    pub offset: f64,
    pub pulse: i32,
    pub leap: i32,
}

impl SockSample {
    /// Sample for a pulse observed at `timestamp`.
    pub fn pulse_at(timestamp: WallTime) -> Self {
        let nanos = timestamp.as_nanos();
        let nearest = nanos.div_euclid(NSEC_PER_SEC)
            + i64::from(timestamp.subsec_nanos() >= NSEC_PER_SEC / 2);
        let offset_ns = nearest * NSEC_PER_SEC - nanos;
        Self {
            tv_sec: timestamp.secs(),
            tv_usec: timestamp.subsec_nanos() / 1_000,
            offset: offset_ns as f64 / NSEC_PER_SEC as f64,
            pulse: 1,
            leap: 0,
        }
    }

    /// Native-endian wire image of `struct sock_sample` on a 64-bit host.
    pub fn encode(&self) -> [u8; SOCK_SAMPLE_LEN] {
        let mut buf = [0u8; SOCK_SAMPLE_LEN];
        let fields: [&[u8]; 7] = [
            &self.tv_sec.to_ne_bytes(),
            &self.tv_usec.to_ne_bytes(),
            &self.offset.to_ne_bytes(),
            &self.pulse.to_ne_bytes(),
            &self.leap.to_ne_bytes(),
            &0i32.to_ne_bytes(),
            &SOCK_MAGIC.to_ne_bytes(),
        ];
        let mut at = 0;
        for field in fields {
            if let Some(dst) = buf.get_mut(at..at + field.len()) {
                dst.copy_from_slice(field);
            }
            at += field.len();
        }
        buf
    }
}

/// Publishes assert edges to chronyd over its SOCK refclock socket.
#[derive(Debug)]
pub struct ChronySockSink {
    path: PathBuf,
    socket: UnixDatagram,
    table: SourceTable,
    sent: u64,
}

impl ChronySockSink {
    /// Connect to the socket chronyd listens on.
    ///
    /// # Errors
    ///
    /// Returns [`PpsError::Registration`] if the socket cannot be reached.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self, PpsError> {
        let path = path.as_ref().to_path_buf();
        let socket = UnixDatagram::unbound()
            .and_then(|s| s.connect(&path).map(|()| s))
            .map_err(|e| PpsError::registration(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "Connected to chrony SOCK refclock");
        Ok(Self {
            path,
            socket,
            table: SourceTable::default(),
            sent: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Samples delivered so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl PpsSink for ChronySockSink {
    fn register_source(&mut self, info: &PpsSourceInfo) -> Result<SourceId, PpsError> {
        let id = self.table.insert(info);
        info!(source = %id, name = %info.name, path = %self.path.display(), "PPS source feeds chrony");
        Ok(id)
    }

    fn publish(&mut self, source: SourceId, event: &EdgeEvent) -> Result<(), PpsError> {
        self.table.get(source)?;
        if event.kind != EdgeKind::Assert {
            return Ok(());
        }

        let sample = SockSample::pulse_at(event.timestamp);
        match self.socket.send(&sample.encode()) {
            Ok(_) => {
                self.sent += 1;
                debug!(source = %source, offset = sample.offset, "chrony sample sent");
                Ok(())
            }
            Err(e) => {
                warn!(source = %source, error = %e, "chrony sample not delivered");
                Err(PpsError::publish(e.to_string()))
            }
        }
    }

    fn unregister_source(&mut self, source: SourceId) -> Result<(), PpsError> {
        self.table.remove(source).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_late_pulse_has_negative_offset() {
        let sample = SockSample::pulse_at(WallTime::from_parts(1_000, 250_000));
        assert_eq!(sample.tv_sec, 1_000);
        assert_eq!(sample.tv_usec, 250);
        assert!((sample.offset + 0.000_25).abs() < 1e-12);
    }

    #[test]
    fn test_early_pulse_has_positive_offset() {
        let sample = SockSample::pulse_at(WallTime::from_parts(1_000, 999_000_000));
        assert!((sample.offset - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_encoded_layout() {
        let sample = SockSample::pulse_at(WallTime::from_parts(7, 0));
        let buf = sample.encode();
        assert_eq!(buf.len(), SOCK_SAMPLE_LEN);
        assert_eq!(buf.get(0..8), Some(&7i64.to_ne_bytes()[..]));
        assert_eq!(buf.get(24..28), Some(&1i32.to_ne_bytes()[..]));
        assert_eq!(buf.get(36..40), Some(&SOCK_MAGIC.to_ne_bytes()[..]));
    }
}
