//! The per-second edge scheduler.
//!
//! Each timer expiry runs one cycle:
//!
//! 1. read the clock; if the wake-up is already in another second, or past the point
//!    where the assert edge should have started, the cycle is late and writes nothing
//! 2. spin to `1s - send_delay - write_time` and write the high level
//! 3. spin to `1s - write_time` and write the low level
//! 4. fold the measured clear-write duration into the write-time estimate
//! 5. fold the wake-up delta into the timer-error estimate (late cycles included)
//! 6. return the next deadline: one second after this nominal expiry, at
//!    `1s - (send_delay + write_time + SAFETY_MARGIN + 2 * timer_error)`
//!
//! The next deadline depends only on the nominal expiry, never on when this cycle
//! finished, so execution jitter does not accumulate.
//!
//! Each spin has its own hold cap. The assert spin may run `max_hold` past the
//! wake-up slack the look-ahead planned for. The clear spin may run `max_hold` past
//! the end of the assert spin. The clear target is exactly `send_delay` after the
//! assert target and a validated `max_hold` exceeds `send_delay`, so the clear cap
//! only fires when the clock misbehaves.

use fx3pps_errors::TransportError;
use fx3pps_transport::{EdgeKind, PpsPort, SignalLevel};
use tracing::{debug, error, trace, warn};

use crate::calibrator::LatencyCalibrator;
use crate::clock::{WallClock, WallTime};
use crate::spin::{SpinOutcome, spin_until};
use crate::stats::CycleStats;
use crate::{NSEC_PER_SEC, SAFETY_MARGIN_NS};

/// How one cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Both edges were written; the clear write took `measured_write_ns`.
    Completed { measured_write_ns: u64 },
    /// The timer woke too late for this second; no write was attempted.
    Late,
    /// An edge write failed. If the assert failed the clear was still written.
    TransportFailed { edge: EdgeKind, error: TransportError },
    /// The hold cap or a second rollover cut the cycle short before `edge`.
    ///
    /// Before the assert nothing is written. Before the clear the low level is
    /// still written so the line is not left high, and the cycle counts as a miss.
    WindowExceeded { edge: EdgeKind },
}

impl CycleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, CycleOutcome::Completed { .. })
    }
}

/// Target in-second offsets of the two edges for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeTiming {
    pub assert_offset_ns: i64,
    pub clear_offset_ns: i64,
}

impl EdgeTiming {
    pub fn new(send_delay_ns: i64, write_time_ns: i64) -> Self {
        Self {
            assert_offset_ns: NSEC_PER_SEC - send_delay_ns - write_time_ns,
            clear_offset_ns: NSEC_PER_SEC - write_time_ns,
        }
    }
}

/// Everything observed during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub nominal: WallTime,
    pub observed: WallTime,
    /// Wake-up delta, observed minus nominal (ns). Negative for an early wake-up.
    pub delta_ns: i64,
    pub timing: EdgeTiming,
    pub outcome: CycleOutcome,
    /// Completion time of the assert write, if it succeeded.
    pub assert_done: Option<WallTime>,
    /// Completion time of the clear write, if it succeeded.
    pub clear_done: Option<WallTime>,
    pub write_time_ns: i64,
    pub timer_error_ns: i64,
    pub next_deadline: WallTime,
}

/// Owns the calibration state of one generator and runs its cycles.
///
/// Only the timer thread holds it, so nothing here is shared or locked.
#[derive(Debug)]
pub struct EdgeScheduler<C> {
    clock: C,
    calibrator: LatencyCalibrator,
    send_delay_ns: i64,
    max_hold_ns: i64,
    stats: CycleStats,
}

impl<C: WallClock> EdgeScheduler<C> {
    pub fn new(clock: C, calibrator: LatencyCalibrator, send_delay_ns: u64, max_hold_ns: u64) -> Self {
        Self {
            clock,
            calibrator,
            send_delay_ns: i64::try_from(send_delay_ns).unwrap_or(i64::MAX),
            max_hold_ns: i64::try_from(max_hold_ns).unwrap_or(i64::MAX),
            stats: CycleStats::new(),
        }
    }

    pub fn calibrator(&self) -> &LatencyCalibrator {
        &self.calibrator
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut CycleStats {
        &mut self.stats
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn send_delay_ns(&self) -> i64 {
        self.send_delay_ns
    }

    /// First deadline after `now`: the current second's boundary minus
    /// `send_delay + write_time + 3 * SAFETY_MARGIN`, or the next second's if that
    /// instant has already passed.
    pub fn first_deadline(&self, now: WallTime) -> WallTime {
        let offset = clamp_offset(NSEC_PER_SEC - self.calibrator.initial_lead_ns(self.send_delay_ns));
        let candidate = WallTime::from_parts(now.secs(), offset);
        if candidate > now {
            candidate
        } else {
            WallTime::from_parts(now.secs() + 1, offset)
        }
    }

    /// Deadline of the cycle after the one nominally due at `nominal`.
    pub fn next_deadline(&self, nominal: WallTime) -> WallTime {
        let offset = clamp_offset(NSEC_PER_SEC - self.calibrator.lead_ns(self.send_delay_ns));
        WallTime::from_parts(nominal.secs() + 1, offset)
    }

    /// Run one cycle for a timer that was due at `nominal`.
    pub fn on_timer_fire<P: PpsPort + ?Sized>(&mut self, nominal: WallTime, port: &mut P) -> CycleReport {
        let observed = self.clock.now();
        let second = nominal.secs();
        let timing = EdgeTiming::new(self.send_delay_ns, self.calibrator.write_time_ns());

        let late = observed.secs() != second || observed.subsec_nanos() > timing.assert_offset_ns;
        let mut assert_done = None;
        let mut clear_done = None;

        let outcome = if late {
            warn!(
                device = %port.info().key,
                nominal = %nominal,
                observed = %observed,
                limit_ns = timing.assert_offset_ns,
                "Timer fired too late, skipping this second"
            );
            CycleOutcome::Late
        } else {
            let slack = self.calibrator.wake_slack_ns();
            let assert_hold = observed.saturating_add_nanos(self.max_hold_ns.saturating_add(slack));
            self.drive_edges(port, second, timing, assert_hold, &mut assert_done, &mut clear_done)
        };

        let delta_ns = observed.nanos_since(nominal);
        let timer_error_ns = self.calibrator.record_timer_delta(delta_ns);
        let next_deadline = self.next_deadline(nominal);
        self.stats.record(&outcome, delta_ns.max(0).unsigned_abs());

        let report = CycleReport {
            nominal,
            observed,
            delta_ns,
            timing,
            outcome,
            assert_done,
            clear_done,
            write_time_ns: self.calibrator.write_time_ns(),
            timer_error_ns,
            next_deadline,
        };
        trace!(
            device = %port.info().key,
            delta_ns,
            write_time_ns = report.write_time_ns,
            timer_error_ns,
            next = %next_deadline,
            "Cycle done"
        );
        report
    }

    fn drive_edges<P: PpsPort + ?Sized>(
        &mut self,
        port: &mut P,
        second: i64,
        timing: EdgeTiming,
        assert_hold: WallTime,
        assert_done: &mut Option<WallTime>,
        clear_done: &mut Option<WallTime>,
    ) -> CycleOutcome {
        let assert_spin = spin_until(&self.clock, second, timing.assert_offset_ns, assert_hold);
        if !assert_spin.is_reached() {
            warn_window(port, EdgeKind::Assert, assert_spin);
            return CycleOutcome::WindowExceeded {
                edge: EdgeKind::Assert,
            };
        }

        let assert_result = port.write_level(SignalLevel::High);
        let assert_at = self.clock.now();
        match assert_result {
            Ok(()) => *assert_done = Some(assert_at),
            Err(e) => log_transport_failure(port, EdgeKind::Assert, &e),
        }

        // The line must not be left high, so the clear edge is written even when
        // the spin was cut short.
        let clear_hold = assert_spin.at().saturating_add_nanos(self.max_hold_ns);
        let clear_spin = spin_until(&self.clock, second, timing.clear_offset_ns, clear_hold);
        let spin_exit = clear_spin.at();
        let clear_result = port.write_level(SignalLevel::Low);
        let clear_at = self.clock.now();

        if let Err(e) = clear_result {
            log_transport_failure(port, EdgeKind::Clear, &e);
        } else {
            *clear_done = Some(clear_at);
        }

        if let Err(error) = assert_result {
            return CycleOutcome::TransportFailed {
                edge: EdgeKind::Assert,
                error,
            };
        }
        if let Err(error) = clear_result {
            return CycleOutcome::TransportFailed {
                edge: EdgeKind::Clear,
                error,
            };
        }
        if !clear_spin.is_reached() {
            warn_window(port, EdgeKind::Clear, clear_spin);
            return CycleOutcome::WindowExceeded {
                edge: EdgeKind::Clear,
            };
        }

        let measured = clear_at.nanos_since(spin_exit).max(0);
        let write_time_ns = self.calibrator.record_write(measured);
        debug!(
            device = %port.info().key,
            measured_ns = measured,
            write_time_ns,
            "Edge pair written"
        );
        CycleOutcome::Completed {
            measured_write_ns: measured.unsigned_abs(),
        }
    }
}

fn clamp_offset(offset: i64) -> i64 {
    offset.clamp(0, NSEC_PER_SEC - 1)
}

fn warn_window<P: PpsPort + ?Sized>(port: &P, edge: EdgeKind, spin: SpinOutcome) {
    let reason = match spin {
        SpinOutcome::SecondRolled(_) => "second rolled over",
        SpinOutcome::HoldExceeded(_) => "hold cap reached",
        SpinOutcome::Reached(_) => "reached",
    };
    warn!(
        device = %port.info().key,
        edge = %edge,
        at = %spin.at(),
        reason,
        "Critical window exceeded"
    );
}

fn log_transport_failure<P: PpsPort + ?Sized>(port: &P, edge: EdgeKind, err: &TransportError) {
    if err.is_timeout() {
        warn!(device = %port.info().key, edge = %edge, error = %err, "Edge write timed out");
    } else {
        error!(
            device = %port.info().key,
            edge = %edge,
            code = err.code().unwrap_or(0),
            error = %err,
            "Edge write failed"
        );
    }
}
