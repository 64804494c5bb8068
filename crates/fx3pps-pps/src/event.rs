//! Edge events as published to a PPS consumer.

use std::fmt;

use fx3pps_scheduler::WallTime;
use fx3pps_transport::EdgeKind;
use serde::Serialize;

/// Handle of a registered PPS source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pps{}", self.0)
    }
}

/// One observed edge.
///
/// The timestamp is taken immediately after the board reported the level, so it
/// includes the USB read latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    pub timestamp: WallTime,
    pub kind: EdgeKind,
    /// Per-kind sequence number, starting at 1.
    pub sequence: u64,
}

impl EdgeEvent {
    pub fn new(timestamp: WallTime, kind: EdgeKind, sequence: u64) -> Self {
        Self {
            timestamp,
            kind,
            sequence,
        }
    }

    /// Signed distance (ns) from the nearest whole second to the timestamp.
    ///
    /// Positive when the edge was seen after the second boundary.
    pub fn second_offset_ns(&self) -> i64 {
        let subsec = self.timestamp.subsec_nanos();
        if subsec >= fx3pps_scheduler::NSEC_PER_SEC / 2 {
            subsec - fx3pps_scheduler::NSEC_PER_SEC
        } else {
            subsec
        }
    }
}

impl fmt::Display for EdgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{} at {}", self.kind, self.sequence, self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_offset() {
        let late = EdgeEvent::new(WallTime::from_parts(100, 1_500), EdgeKind::Assert, 1);
        assert_eq!(late.second_offset_ns(), 1_500);

        let early = EdgeEvent::new(WallTime::from_parts(100, 999_999_000), EdgeKind::Assert, 2);
        assert_eq!(early.second_offset_ns(), -1_000);
    }

    #[test]
    fn test_display() {
        let ev = EdgeEvent::new(WallTime::from_parts(5, 7), EdgeKind::Clear, 3);
        assert_eq!(ev.to_string(), "clear #3 at 5.000000007");
        assert_eq!(SourceId(2).to_string(), "pps2");
    }
}
