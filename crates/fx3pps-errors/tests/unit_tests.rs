//! Unit tests for all error variants.
//!
//! Tests Display implementations, std::error::Error implementations,
//! and From conversions.

use fx3pps_errors::{AttachError, ConfigError, ErrorSeverity, PpsError, TransportError};

mod transport_error_tests {
    use super::*;

    fn all_variants() -> Vec<TransportError> {
        vec![
            TransportError::timeout(1500),
            TransportError::rejected(-1, "Input/Output Error"),
            TransportError::Disconnected,
            TransportError::ShortTransfer {
                expected: 1,
                actual: 0,
            },
            TransportError::NotFound {
                vendor_id: 0x04b4,
                product_id: 0x00f0,
            },
            TransportError::Busy,
            TransportError::PermissionDenied,
            TransportError::Io(std::io::ErrorKind::Other),
        ]
    }

    #[test]
    fn test_all_variants_display() {
        for variant in all_variants() {
            assert!(
                !variant.to_string().is_empty(),
                "TransportError variant should have display message"
            );
        }
    }

    #[test]
    fn test_std_error_impl() {
        let err = TransportError::Disconnected;
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn test_only_timeout_is_timeout() {
        let timeouts = all_variants()
            .into_iter()
            .filter(TransportError::is_timeout)
            .count();
        assert_eq!(timeouts, 1);
    }
}

mod attach_error_tests {
    use super::*;

    #[test]
    fn test_from_conversions() {
        let err: AttachError = TransportError::Busy.into();
        assert!(matches!(err, AttachError::Transport(TransportError::Busy)));

        let err: AttachError = ConfigError::invalid("bad").into();
        assert!(matches!(err, AttachError::Config(_)));

        let err: AttachError = PpsError::registration("no socket").into();
        assert!(matches!(err, AttachError::PpsRegistration(_)));
    }

    #[test]
    fn test_spawn_keeps_io_message() {
        let io = std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no memory for stack");
        let err = AttachError::spawn(&io);
        assert!(err.to_string().contains("no memory for stack"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}

mod severity_tests {
    use super::*;

    #[test]
    fn test_attach_severity_follows_transport() {
        let cases = [
            (TransportError::Busy, ErrorSeverity::Warning),
            (TransportError::Disconnected, ErrorSeverity::Critical),
            (TransportError::PermissionDenied, ErrorSeverity::Error),
        ];
        for (transport, severity) in cases {
            let err: AttachError = transport.into();
            assert_eq!(err.severity(), severity, "{err}");
        }
    }

    #[test]
    fn test_already_attached_is_informational() {
        let err = AttachError::AlreadyAttached("2-4".to_string());
        assert_eq!(err.severity(), ErrorSeverity::Info);
        assert!(!err.is_retryable());
    }
}
