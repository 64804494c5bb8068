//! Cycle-level tests for the edge scheduler on a simulated clock.
//!
//! Every cycle here is driven by hand: the test moves the [`SimClock`] to the
//! wake-up instant and calls `on_timer_fire`. The clock advances by a fixed step per
//! read and by the scripted duration per write, so a clear write measured by the
//! scheduler takes `write + step` ns.

use fx3pps_errors::TransportError;
use fx3pps_scheduler::{
    CycleOutcome, EdgeScheduler, GeneratorConfig, LatencyCalibrator, NSEC_PER_SEC,
    SAFETY_MARGIN_NS, WallTime,
};
use fx3pps_test_helpers::prelude::*;
use fx3pps_transport::{EdgeKind, SignalLevel};
use tracing_test::traced_test;

const SECOND: i64 = 1_700_000_000;

fn scheduler(
    clock: &SimClock,
    write_time_ns: i64,
    timer_error_ns: i64,
    send_delay_ns: u64,
    max_hold_ns: u64,
) -> EdgeScheduler<SimClock> {
    EdgeScheduler::new(
        clock.clone(),
        LatencyCalibrator::with_estimates(write_time_ns, timer_error_ns),
        send_delay_ns,
        max_hold_ns,
    )
}

/// Wake up `late_ns` after `nominal` and run the cycle.
fn fire(
    sched: &mut EdgeScheduler<SimClock>,
    clock: &SimClock,
    port: &mut MockPort,
    nominal: WallTime,
    late_ns: i64,
) -> fx3pps_scheduler::CycleReport {
    clock.set(nominal.saturating_add_nanos(late_ns));
    sched.on_timer_fire(nominal, port)
}

#[test]
fn test_edges_land_at_their_offsets() {
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 1_000);
    let mut port = MockPort::generator(clock.clone(), 10_000);
    let handle = port.handle();
    let mut sched = scheduler(&clock, 10_000, 0, 100_000_000, 1_000_000_000);

    let report = fire(&mut sched, &clock, &mut port, WallTime::from_parts(SECOND, 0), 0);

    assert!(report.outcome.is_completed(), "{:?}", report.outcome);
    assert_eq!(report.timing.assert_offset_ns, 899_990_000);
    assert_eq!(report.timing.clear_offset_ns, 999_990_000);

    let writes = handle.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].level, SignalLevel::High);
    assert_eq!(writes[1].level, SignalLevel::Low);
    for (write, target) in writes.iter().zip([899_990_000, 999_990_000]) {
        assert_eq!(write.requested.secs(), SECOND);
        let slack = write.requested.subsec_nanos() - target;
        assert!((0..=2_000).contains(&slack), "requested {} for {target}", write.requested);
    }
    // Clear write lands on the second boundary within a few clock steps.
    let clear_done = must_some(report.clear_done, "clear write succeeded");
    assert!(clear_done.nanos_since(WallTime::from_parts(SECOND + 1, 0)).abs() <= 2_000);
}

#[test]
fn test_write_estimate_converges_by_halving() {
    // One ns per read makes each measured write exactly 20_001 ns.
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 1);
    let mut port = MockPort::generator(clock.clone(), 20_000);
    let mut sched = scheduler(&clock, 0, 0, 30_000, 250_000_000);

    let mut nominal = WallTime::from_parts(SECOND, NSEC_PER_SEC - 30_000 - SAFETY_MARGIN_NS);
    let mut estimates = Vec::new();
    for _ in 0..3 {
        let report = fire(&mut sched, &clock, &mut port, nominal, 0);
        assert_eq!(
            report.outcome,
            CycleOutcome::Completed {
                measured_write_ns: 20_001
            }
        );
        estimates.push(report.write_time_ns);
        nominal = report.next_deadline;
    }
    assert_eq!(estimates, vec![10_000, 15_000, 17_500]);
}

#[test]
fn test_timer_error_tracks_peaks_and_decays() {
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 10);
    let mut port = MockPort::generator(clock.clone(), 5_000);
    let mut sched = scheduler(&clock, 5_000, 3_000, 30_000, 250_000_000);

    let first = sched.next_deadline(WallTime::from_parts(SECOND - 1, 0));
    let report = fire(&mut sched, &clock, &mut port, first, 5_000);
    assert_eq!(report.delta_ns, 5_000);
    assert_eq!(report.timer_error_ns, 5_000);

    let report = fire(&mut sched, &clock, &mut port, report.next_deadline, 1_000);
    assert_eq!(report.timer_error_ns, 4_000);
}

#[test]
fn test_assert_precedes_clear_within_the_second() {
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 10);
    let mut port = MockPort::generator(clock.clone(), 10_000);
    let mut sched = scheduler(&clock, 10_000, SAFETY_MARGIN_NS, 30_000, 250_000_000);

    let mut nominal = sched.first_deadline(clock.peek());
    for lateness in [0, 700, 1_500, 0, 2_900] {
        let report = fire(&mut sched, &clock, &mut port, nominal, lateness);
        assert!(report.outcome.is_completed(), "{:?}", report.outcome);

        let second = nominal.secs();
        let assert_done = must_some(report.assert_done, "assert write succeeded");
        let clear_done = must_some(report.clear_done, "clear write succeeded");
        assert!(assert_done < clear_done);
        assert_eq!(assert_done.secs(), second);
        assert!(clear_done <= WallTime::from_parts(second + 1, 1_000));

        nominal = report.next_deadline;
    }
}

#[test]
fn test_next_deadline_follows_nominal_not_completion() {
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 10);
    let mut port = MockPort::generator(clock.clone(), 8_000);
    let mut sched = scheduler(&clock, 8_000, 0, 30_000, 250_000_000);

    let mut nominal = sched.first_deadline(clock.peek());
    for lateness in [0, 4_000, 12_000, 500, 0, 9_000] {
        let report = fire(&mut sched, &clock, &mut port, nominal, lateness);
        let lead = sched.calibrator().lead_ns(30_000);
        assert_eq!(report.next_deadline.secs(), nominal.secs() + 1);
        assert_eq!(report.next_deadline.subsec_nanos(), NSEC_PER_SEC - lead);
        nominal = report.next_deadline;
    }
}

#[test]
#[traced_test]
fn test_late_wakeup_skips_the_second() {
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 1_000);
    let mut port = MockPort::generator(clock.clone(), 10_000);
    let handle = port.handle();
    let mut sched = scheduler(&clock, 10_000, 0, 100_000_000, 250_000_000);

    let nominal = WallTime::from_parts(SECOND, 899_000_000);
    let report = fire(&mut sched, &clock, &mut port, nominal, 2_000_000);

    assert_eq!(report.outcome, CycleOutcome::Late);
    assert_eq!(handle.write_count(), 0);
    assert_eq!(report.assert_done, None);
    assert_eq!(report.clear_done, None);
    assert_eq!(report.write_time_ns, 10_000);
    assert_eq!(report.timer_error_ns, 2_000_000);
    assert_eq!(report.next_deadline.secs(), SECOND + 1);
    assert_eq!(sched.stats().late, 1);
    assert!(logs_contain("Timer fired too late"));
}

#[test]
fn test_wakeup_in_the_next_second_is_late() {
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 1_000);
    let mut port = MockPort::generator(clock.clone(), 10_000);
    let handle = port.handle();
    let mut sched = scheduler(&clock, 10_000, 0, 30_000, 250_000_000);

    let nominal = WallTime::from_parts(SECOND, 999_000_000);
    let report = fire(&mut sched, &clock, &mut port, nominal, 1_500_000_000);

    assert_eq!(report.outcome, CycleOutcome::Late);
    assert_eq!(handle.write_count(), 0);
    assert_eq!(report.next_deadline.secs(), SECOND + 1);
}

#[test]
fn test_early_wakeup_pulls_timer_error_down() {
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 10);
    let mut port = MockPort::generator(clock.clone(), 5_000);
    let mut sched = scheduler(&clock, 5_000, 2_000, 30_000, 250_000_000);

    let nominal = sched.first_deadline(clock.peek());
    let report = fire(&mut sched, &clock, &mut port, nominal, -1_000);
    assert!(report.outcome.is_completed(), "{:?}", report.outcome);
    assert_eq!(report.delta_ns, -1_000);
    assert_eq!(report.timer_error_ns, 1_250);
    assert_eq!(sched.stats().max_delta_ns, 0);

    // Far too early: the estimate bottoms out at zero.
    let report = fire(&mut sched, &clock, &mut port, report.next_deadline, -40_000);
    assert_eq!(report.timer_error_ns, 0);
}

#[test]
#[traced_test]
fn test_failed_assert_still_clears_the_line() {
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 10);
    let mut port =
        MockPort::generator(clock.clone(), 6_000).with_write_failure(TransportError::timeout(100));
    let handle = port.handle();
    let mut sched = scheduler(&clock, 6_000, 0, 30_000, 250_000_000);

    let nominal = sched.first_deadline(clock.peek());
    let report = fire(&mut sched, &clock, &mut port, nominal, 0);

    assert_eq!(
        report.outcome,
        CycleOutcome::TransportFailed {
            edge: EdgeKind::Assert,
            error: TransportError::timeout(100),
        }
    );
    let writes = handle.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1].level, SignalLevel::Low);
    assert_eq!(writes[1].result, Ok(()));
    assert_eq!(report.assert_done, None);
    assert!(report.clear_done.is_some());
    assert_eq!(report.write_time_ns, 6_000);
    assert_eq!(report.next_deadline.secs(), nominal.secs() + 1);
    assert!(logs_contain("Edge write timed out"));
}

#[test]
#[traced_test]
fn test_failed_clear_is_reported_with_code() {
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 10);
    let mut port = MockPort::generator(clock.clone(), 6_000)
        .with_write_durations([6_000])
        .with_write_failure(TransportError::rejected(-9, "pipe error"));
    let mut sched = scheduler(&clock, 6_000, 0, 30_000, 250_000_000);

    let nominal = sched.first_deadline(clock.peek());
    let report = fire(&mut sched, &clock, &mut port, nominal, 0);

    assert!(matches!(
        report.outcome,
        CycleOutcome::TransportFailed {
            edge: EdgeKind::Clear,
            ..
        }
    ));
    assert!(report.assert_done.is_some());
    assert_eq!(report.clear_done, None);
    assert_eq!(report.write_time_ns, 6_000);
    assert_eq!(sched.stats().transport_failures, 1);
    assert!(logs_contain("Edge write failed"));
    assert!(logs_contain("code=-9"));
}

#[test]
fn test_hold_cap_before_assert_writes_nothing() {
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 1_000);
    let mut port = MockPort::generator(clock.clone(), 10_000);
    let handle = port.handle();
    // Assert is due at 0.89999 s but the hold cap ends the spin 50 ms after 0.7 s.
    let mut sched = scheduler(&clock, 10_000, 0, 100_000_000, 50_000_000);

    let report = fire(&mut sched, &clock, &mut port, WallTime::from_parts(SECOND, 700_000_000), 0);

    assert_eq!(
        report.outcome,
        CycleOutcome::WindowExceeded {
            edge: EdgeKind::Assert
        }
    );
    assert_eq!(handle.write_count(), 0);
    assert_eq!(sched.stats().window_exceeded, 1);
}

#[test]
fn test_hold_cap_before_clear_forces_low() {
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 1_000);
    let mut port = MockPort::generator(clock.clone(), 10_000);
    let handle = port.handle();
    let mut sched = scheduler(&clock, 10_000, 0, 100_000_000, 50_000_000);

    let report = fire(&mut sched, &clock, &mut port, WallTime::from_parts(SECOND, 899_000_000), 0);

    assert_eq!(
        report.outcome,
        CycleOutcome::WindowExceeded {
            edge: EdgeKind::Clear
        }
    );
    let writes = handle.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].level, SignalLevel::High);
    assert_eq!(writes[1].level, SignalLevel::Low);
    // Clear was forced at the cap, 50 ms after the assert spin, well before its offset.
    assert!(writes[1].requested.subsec_nanos() < 950_000_000);
    assert_eq!(report.write_time_ns, 10_000);
}

#[test]
fn test_minimum_hold_keeps_clear_edges_on_time() {
    for send_delay_ns in [100_000_000, 30_000] {
        let config = must(
            GeneratorConfig::builder()
                .send_delay_ns(send_delay_ns)
                .max_hold_ns(GeneratorConfig::min_hold_ns(send_delay_ns))
                .build(),
        );
        let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 10);
        let mut port = MockPort::generator(clock.clone(), 12_000);
        let handle = port.handle();
        let mut sched = scheduler(
            &clock,
            10_000,
            SAFETY_MARGIN_NS,
            config.send_delay_ns,
            config.max_hold_ns,
        );

        // A steady 50 us of timer lateness, far above the seeded error.
        let mut nominal = sched.first_deadline(clock.peek());
        let mut outcomes = Vec::new();
        for _ in 0..6 {
            handle.clear_writes();
            let report = fire(&mut sched, &clock, &mut port, nominal, 50_000);
            if report.outcome.is_completed() {
                let writes = handle.writes();
                assert_eq!(writes.len(), 2);
                let clear = writes[1].requested;
                assert_eq!(clear.secs(), nominal.secs());
                let slack = clear.subsec_nanos() - report.timing.clear_offset_ns;
                assert!((0..=100).contains(&slack), "clear requested at {clear}");
            }
            outcomes.push(report.outcome);
            nominal = report.next_deadline;
        }

        // Only the first cycle, scheduled before any lateness was seen, is lost.
        assert_eq!(outcomes[0], CycleOutcome::Late, "send delay {send_delay_ns}");
        assert!(
            outcomes[1..].iter().all(CycleOutcome::is_completed),
            "send delay {send_delay_ns}: {outcomes:?}"
        );
        assert_eq!(sched.stats().window_exceeded, 0);
        assert!(sched.calibrator().write_time_ns() > 11_900);
        assert_eq!(sched.calibrator().timer_error_ns(), 50_000);
    }
}

#[test]
fn test_first_deadline_rolls_to_next_second_when_passed() {
    let clock = SimClock::at(SECOND, 0);
    let sched = scheduler(&clock, 10_000, 0, 100_000_000, 250_000_000);
    let offset = NSEC_PER_SEC - (100_000_000 + 10_000 + 3 * SAFETY_MARGIN_NS);

    let early = sched.first_deadline(WallTime::from_parts(SECOND, 100));
    assert_eq!(early, WallTime::from_parts(SECOND, offset));

    let passed = sched.first_deadline(WallTime::from_parts(SECOND, offset));
    assert_eq!(passed, WallTime::from_parts(SECOND + 1, offset));
}

#[test]
fn test_stats_follow_outcomes() {
    let clock = SimClock::new(WallTime::from_parts(SECOND, 0), 10);
    let mut port = MockPort::generator(clock.clone(), 5_000);
    let mut sched = scheduler(&clock, 5_000, 0, 30_000, 250_000_000);

    let mut nominal = sched.first_deadline(clock.peek());
    for lateness in [0, 0, 0, 600_000_000] {
        let report = fire(&mut sched, &clock, &mut port, nominal, lateness);
        nominal = report.next_deadline;
    }

    let stats = sched.stats();
    assert_eq!(stats.cycles, 4);
    assert_eq!(stats.late, 1);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.max_delta_ns, 600_000_000);
}
