//! Latency calibration.
//!
//! Two smoothed estimates drive the scheduler's look-ahead:
//!
//! - **write time**: how long one transport write takes to complete, smoothed with
//!   factor ½ after every clean edge pair;
//! - **timer error**: how late the timer callback observes the clock relative to its
//!   nominal expiry. Regressions are taken at face value immediately, improvements
//!   decay in with weight ¼.
//!
//! Before the first tick a warm-up pass seeds the write-time estimate from a burst
//! of timed writes.

use fx3pps_errors::AttachError;
use fx3pps_transport::{PpsPort, SignalLevel};
use tracing::{debug, info, warn};

use crate::SAFETY_MARGIN_NS;
use crate::clock::WallClock;

/// Result of a warm-up pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmUpReport {
    pub attempted: u32,
    pub succeeded: u32,
    pub mean_write_ns: i64,
    pub min_write_ns: i64,
    pub max_write_ns: i64,
}

/// Smoothed write-time and timer-error estimates.
///
/// Both estimates are non-negative at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyCalibrator {
    write_time_ns: i64,
    timer_error_ns: i64,
    calibrated: bool,
}

impl LatencyCalibrator {
    /// Fresh estimates: the given write-time seed and a timer error of one safety margin.
    pub fn new(initial_write_time_ns: i64) -> Self {
        Self::with_estimates(initial_write_time_ns, SAFETY_MARGIN_NS)
    }

    pub fn with_estimates(write_time_ns: i64, timer_error_ns: i64) -> Self {
        Self {
            write_time_ns: write_time_ns.max(0),
            timer_error_ns: timer_error_ns.max(0),
            calibrated: false,
        }
    }

    #[inline]
    pub fn write_time_ns(&self) -> i64 {
        self.write_time_ns
    }

    #[inline]
    pub fn timer_error_ns(&self) -> i64 {
        self.timer_error_ns
    }

    /// Whether a warm-up pass has completed.
    #[inline]
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Fold one measured write duration into the estimate.
    #[inline]
    pub fn record_write(&mut self, measured_ns: i64) -> i64 {
        self.write_time_ns = (self.write_time_ns + measured_ns.max(0)) / 2;
        self.write_time_ns
    }

    /// Fold one timer delta (observed minus nominal) into the estimate.
    ///
    /// The filter runs on the signed delta, so an early wake-up pulls the estimate
    /// down harder than a punctual one. Only the result is floored at zero.
    #[inline]
    pub fn record_timer_delta(&mut self, delta_ns: i64) -> i64 {
        let filtered = if delta_ns >= self.timer_error_ns {
            delta_ns
        } else {
            (3 * self.timer_error_ns + delta_ns) / 4
        };
        self.timer_error_ns = filtered.max(0);
        self.timer_error_ns
    }

    /// Slack the look-ahead keeps between the wake-up and the assert spin target.
    #[inline]
    pub fn wake_slack_ns(&self) -> i64 {
        SAFETY_MARGIN_NS + 2 * self.timer_error_ns
    }

    /// Steady-state look-ahead: how far before the second boundary the timer must fire.
    #[inline]
    pub fn lead_ns(&self, send_delay_ns: i64) -> i64 {
        send_delay_ns + self.write_time_ns + self.wake_slack_ns()
    }

    /// Look-ahead for the very first deadline, before any timer delta was observed.
    #[inline]
    pub fn initial_lead_ns(&self, send_delay_ns: i64) -> i64 {
        send_delay_ns + self.write_time_ns + 3 * SAFETY_MARGIN_NS
    }

    /// Seed the write-time estimate from `samples` timed writes of the low level.
    ///
    /// Runs at most once; later calls return `None` and leave the estimate alone.
    /// Failed writes are logged and left out of the average.
    ///
    /// # Errors
    ///
    /// Returns [`AttachError::Calibration`] if every write failed.
    pub fn warm_up<P, C>(
        &mut self,
        port: &mut P,
        clock: &C,
        samples: u32,
    ) -> Result<Option<WarmUpReport>, AttachError>
    where
        P: PpsPort + ?Sized,
        C: WallClock + ?Sized,
    {
        if self.calibrated {
            return Ok(None);
        }

        let mut acc: i64 = 0;
        let mut succeeded: u32 = 0;
        let mut min_write_ns = i64::MAX;
        let mut max_write_ns = 0;

        for _ in 0..samples {
            let start = clock.now();
            let result = port.write_level(SignalLevel::Low);
            let elapsed = clock.now().nanos_since(start).max(0);
            match result {
                Ok(()) => {
                    acc += elapsed;
                    succeeded += 1;
                    min_write_ns = min_write_ns.min(elapsed);
                    max_write_ns = max_write_ns.max(elapsed);
                }
                Err(e) => {
                    debug!(device = %port.info().key, error = %e, "Warm-up write failed");
                }
            }
        }

        if succeeded == 0 {
            warn!(device = %port.info().key, attempted = samples, "Warm-up calibration failed");
            return Err(AttachError::Calibration { attempted: samples });
        }

        let mean_write_ns = if succeeded == samples && samples.is_power_of_two() {
            acc >> samples.trailing_zeros()
        } else {
            acc / i64::from(succeeded)
        };

        self.write_time_ns = mean_write_ns;
        self.calibrated = true;

        let report = WarmUpReport {
            attempted: samples,
            succeeded,
            mean_write_ns,
            min_write_ns,
            max_write_ns,
        };
        info!(
            device = %port.info().key,
            write_time_ns = mean_write_ns,
            min_ns = min_write_ns,
            max_ns = max_write_ns,
            failed = samples - succeeded,
            "Write-time calibration done"
        );
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed() {
        let cal = LatencyCalibrator::new(10_000);
        assert_eq!(cal.write_time_ns(), 10_000);
        assert_eq!(cal.timer_error_ns(), SAFETY_MARGIN_NS);
        assert!(!cal.is_calibrated());
    }

    #[test]
    fn test_write_smoothing_halves_error() {
        let mut cal = LatencyCalibrator::with_estimates(0, 0);
        assert_eq!(cal.record_write(20_000), 10_000);
        assert_eq!(cal.record_write(20_000), 15_000);
        assert_eq!(cal.record_write(20_000), 17_500);
    }

    #[test]
    fn test_timer_error_jumps_up_and_decays_down() {
        let mut cal = LatencyCalibrator::with_estimates(0, 3_000);
        assert_eq!(cal.record_timer_delta(5_000), 5_000);
        assert_eq!(cal.record_timer_delta(1_000), 4_000);
        assert_eq!(cal.record_timer_delta(4_000), 4_000);
    }

    #[test]
    fn test_negative_delta_is_filtered_signed() {
        let mut cal = LatencyCalibrator::with_estimates(0, 2_000);
        assert_eq!(cal.record_timer_delta(-1_000), 1_250);

        let mut cal = LatencyCalibrator::with_estimates(0, 4_000);
        assert_eq!(cal.record_timer_delta(-50_000), 0);
        assert_eq!(cal.timer_error_ns(), 0);
    }

    #[test]
    fn test_lead() {
        let cal = LatencyCalibrator::with_estimates(10_000, 5_000);
        assert_eq!(cal.lead_ns(100_000_000), 100_000_000 + 10_000 + 3_000 + 10_000);
        assert_eq!(cal.initial_lead_ns(100_000_000), 100_000_000 + 10_000 + 9_000);
        assert_eq!(cal.wake_slack_ns(), 3_000 + 10_000);
    }
}
