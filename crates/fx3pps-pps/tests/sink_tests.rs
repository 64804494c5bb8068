//! Sink tests: the chrony SOCK refclock wire path and the logging sink.

#![cfg(test)]

use fx3pps_pps::prelude::*;
use fx3pps_scheduler::WallTime;
use fx3pps_test_helpers::prelude::*;
use fx3pps_transport::{DeviceKey, EdgeKind};
use proptest::prelude::*;
use tracing_test::traced_test;

fn source_info() -> PpsSourceInfo {
    PpsSourceInfo::receiver(DeviceKey::new(2, 5))
}

#[cfg(unix)]
mod chrony {
    use super::*;
    use fx3pps_pps::SockSample;
    use fx3pps_pps::chrony::{SOCK_MAGIC, SOCK_SAMPLE_LEN};
    use std::os::unix::net::UnixDatagram;
    use std::time::Duration;

    fn field(buf: &[u8], range: std::ops::Range<usize>) -> [u8; 8] {
        let mut out = [0u8; 8];
        if let (Some(src), Some(dst)) = (buf.get(range.clone()), out.get_mut(..range.len())) {
            dst.copy_from_slice(src);
        }
        out
    }

    #[test]
    fn test_assert_edges_reach_chronyd() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fx3pps.sock");
        let chronyd = UnixDatagram::bind(&path)?;
        chronyd.set_read_timeout(Some(Duration::from_secs(2)))?;

        let mut sink = ChronySockSink::connect(&path)?;
        let id = sink.register_source(&source_info())?;
        let assert_at = WallTime::from_parts(1_700_000_123, 250_000);
        sink.publish(id, &EdgeEvent::new(assert_at, EdgeKind::Assert, 1))?;

        let mut buf = [0u8; 64];
        let len = chronyd.recv(&mut buf)?;
        assert_eq!(len, SOCK_SAMPLE_LEN);
        assert_eq!(i64::from_ne_bytes(field(&buf, 0..8)), 1_700_000_123);
        assert_eq!(i64::from_ne_bytes(field(&buf, 8..16)), 250);
        let offset = f64::from_ne_bytes(field(&buf, 16..24));
        assert!((offset + 0.000_25).abs() < 1e-12, "offset {offset}");
        let magic = field(&buf, 36..40);
        assert_eq!(magic.get(..4), Some(&SOCK_MAGIC.to_ne_bytes()[..]));
        assert_eq!(sink.sent(), 1);
        Ok(())
    }

    #[test]
    #[traced_test]
    fn test_connect_and_delivery_failure_are_logged() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fx3pps.sock");
        let chronyd = UnixDatagram::bind(&path)?;

        let mut sink = ChronySockSink::connect(&path)?;
        let id = sink.register_source(&source_info())?;
        assert!(logs_contain("Connected to chrony SOCK refclock"));
        assert!(logs_contain("PPS source feeds chrony"));

        drop(chronyd);
        let event = EdgeEvent::new(WallTime::from_parts(10, 0), EdgeKind::Assert, 1);
        assert!(sink.publish(id, &event).is_err());
        assert!(logs_contain("chrony sample not delivered"));
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_sample_points_at_nearest_second(
            secs in 0i64..4_000_000_000,
            subsec in 0i64..1_000_000_000,
        ) {
            let timestamp = WallTime::from_parts(secs, subsec);
            let buf = SockSample::pulse_at(timestamp).encode();

            prop_assert_eq!(buf.len(), SOCK_SAMPLE_LEN);
            prop_assert_eq!(i64::from_ne_bytes(field(&buf, 0..8)), secs);
            prop_assert_eq!(i64::from_ne_bytes(field(&buf, 8..16)), subsec / 1_000);
            let pulse = field(&buf, 24..28);
            prop_assert_eq!(pulse.get(..4), Some(&1i32.to_ne_bytes()[..]));
            let magic = field(&buf, 36..40);
            prop_assert_eq!(magic.get(..4), Some(&SOCK_MAGIC.to_ne_bytes()[..]));

            // Applying the offset lands on a whole second no more than half a second away.
            let offset = f64::from_ne_bytes(field(&buf, 16..24));
            prop_assert!(offset.abs() <= 0.5, "offset {}", offset);
            let corrected = subsec + (offset * 1e9).round() as i64;
            prop_assert_eq!(corrected.rem_euclid(1_000_000_000), 0);
        }
    }

    #[test]
    fn test_clear_edges_are_not_sent() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fx3pps.sock");
        let chronyd = UnixDatagram::bind(&path)?;
        chronyd.set_nonblocking(true)?;

        let mut sink = ChronySockSink::connect(&path)?;
        let id = sink.register_source(&source_info())?;
        let event = EdgeEvent::new(WallTime::from_parts(10, 100_000_000), EdgeKind::Clear, 1);
        sink.publish(id, &event)?;

        let mut buf = [0u8; 64];
        assert!(chronyd.recv(&mut buf).is_err());
        assert_eq!(sink.sent(), 0);
        Ok(())
    }

    #[test]
    fn test_connect_fails_without_listener() -> TestResult {
        let dir = tempfile::tempdir()?;
        let result = ChronySockSink::connect(dir.path().join("missing.sock"));
        assert!(matches!(result, Err(PpsError::Registration(_))));
        Ok(())
    }

    #[test]
    fn test_publish_fails_once_chronyd_is_gone() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fx3pps.sock");
        let chronyd = UnixDatagram::bind(&path)?;

        let mut sink = ChronySockSink::connect(&path)?;
        let id = sink.register_source(&source_info())?;
        drop(chronyd);

        let event = EdgeEvent::new(WallTime::from_parts(10, 0), EdgeKind::Assert, 1);
        assert!(matches!(sink.publish(id, &event), Err(PpsError::Publish(_))));
        Ok(())
    }

    #[test]
    fn test_unknown_source_is_rejected() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fx3pps.sock");
        let _chronyd = UnixDatagram::bind(&path)?;

        let mut sink = ChronySockSink::connect(&path)?;
        let id = sink.register_source(&source_info())?;
        sink.unregister_source(id)?;

        let event = EdgeEvent::new(WallTime::from_parts(10, 0), EdgeKind::Assert, 1);
        assert_eq!(sink.publish(id, &event), Err(PpsError::NotRegistered(id.0)));
        assert_eq!(sink.unregister_source(id), Err(PpsError::NotRegistered(id.0)));
        Ok(())
    }
}

mod log_sink {
    use super::*;

    #[test]
    fn test_boxed_sink_forwards() -> TestResult {
        let mut sink: Box<dyn PpsSink> = Box::new(LogSink::new());
        let id = sink.register_source(&source_info())?;
        sink.publish(id, &EdgeEvent::new(WallTime::from_parts(1, 5), EdgeKind::Assert, 1))?;
        sink.unregister_source(id)?;
        Ok(())
    }

    #[test]
    #[traced_test]
    fn test_log_sink_logs_each_event() -> TestResult {
        let mut sink = LogSink::new();
        let id = sink.register_source(&source_info())?;
        sink.publish(id, &EdgeEvent::new(WallTime::from_parts(7, 2_000), EdgeKind::Assert, 9))?;
        sink.unregister_source(id)?;

        assert!(logs_contain("PPS source registered"));
        assert!(logs_contain("PPS event"));
        assert!(logs_contain("sequence=9"));
        assert!(logs_contain("PPS source unregistered"));
        Ok(())
    }

    #[test]
    fn test_recording_sink_shares_state_between_clones() -> TestResult {
        let sink = RecordingSink::new();
        let mut handed_out = sink.clone();
        let id = handed_out.register_source(&source_info())?;
        handed_out.publish(id, &EdgeEvent::new(WallTime::from_parts(1, 5), EdgeKind::Clear, 4))?;

        assert_eq!(sink.registered().len(), 1);
        let event = must_some(sink.events().first().copied(), "one event");
        assert_eq!(event.sequence, 4);
        Ok(())
    }
}
