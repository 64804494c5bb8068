//! Generator bring-up and teardown.
//!
//! [`Generator::attach`] does everything that can fail before any thread exists:
//! it validates the configuration, seeds the estimates and runs the warm-up burst.
//! Only then is the timer thread spawned, owning the port, the clock and the
//! [`EdgeScheduler`]. [`Generator::detach`] cancels the timer and joins the thread,
//! so no cycle can be in flight once it returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::thread::JoinHandle;

use fx3pps_errors::AttachError;
use fx3pps_transport::{DeviceInfo, PpsPort};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calibrator::LatencyCalibrator;
use crate::clock::{WallClock, WallTime};
use crate::config::GeneratorConfig;
use crate::edge::{CycleReport, EdgeScheduler};
use crate::rt_setup;
use crate::stats::CycleStats;
use crate::timer::{DeadlineTimer, TimerCanceller, TimerWait};

/// Live counters and estimates of a running generator.
///
/// Written by the timer thread after every cycle with relaxed stores, copied from
/// the scheduler's [`CycleStats`]; read by anyone holding the `Arc`. Values are
/// individually consistent only.
#[derive(Debug, Default)]
pub struct GeneratorStatus {
    write_time_ns: AtomicI64,
    timer_error_ns: AtomicI64,
    cycles: AtomicU64,
    completed: AtomicU64,
    late: AtomicU64,
    transport_failures: AtomicU64,
    window_exceeded: AtomicU64,
    max_delta_ns: AtomicU64,
    p50_delta_ns: AtomicU64,
    p99_delta_ns: AtomicU64,
    last_nominal_ns: AtomicI64,
    next_deadline_ns: AtomicI64,
    calibrated: AtomicBool,
    running: AtomicBool,
}

/// Point-in-time copy of a [`GeneratorStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GeneratorSnapshot {
    pub write_time_ns: i64,
    pub timer_error_ns: i64,
    pub cycles: u64,
    pub completed: u64,
    pub late: u64,
    pub transport_failures: u64,
    pub window_exceeded: u64,
    /// Largest wake-up delta seen (ns).
    pub max_delta_ns: u64,
    /// Median wake-up delta over the recent window (ns).
    pub p50_delta_ns: u64,
    /// 99th percentile wake-up delta over the recent window (ns).
    pub p99_delta_ns: u64,
    pub last_nominal_ns: i64,
    pub next_deadline_ns: i64,
    pub calibrated: bool,
    pub running: bool,
}

impl GeneratorStatus {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_estimates(&self, calibrator: &LatencyCalibrator) {
        self.write_time_ns
            .store(calibrator.write_time_ns(), Ordering::Relaxed);
        self.timer_error_ns
            .store(calibrator.timer_error_ns(), Ordering::Relaxed);
        self.calibrated
            .store(calibrator.is_calibrated(), Ordering::Relaxed);
    }

    /// Publish the state after one cycle.
    fn publish(&self, report: &CycleReport, stats: &mut CycleStats) {
        self.cycles.store(stats.cycles, Ordering::Relaxed);
        self.completed.store(stats.completed, Ordering::Relaxed);
        self.late.store(stats.late, Ordering::Relaxed);
        self.transport_failures
            .store(stats.transport_failures, Ordering::Relaxed);
        self.window_exceeded
            .store(stats.window_exceeded, Ordering::Relaxed);
        self.max_delta_ns.store(stats.max_delta_ns, Ordering::Relaxed);
        self.p50_delta_ns
            .store(stats.p50_delta_ns(), Ordering::Relaxed);
        self.p99_delta_ns
            .store(stats.p99_delta_ns(), Ordering::Relaxed);
        self.write_time_ns
            .store(report.write_time_ns, Ordering::Relaxed);
        self.timer_error_ns
            .store(report.timer_error_ns, Ordering::Relaxed);
        self.last_nominal_ns
            .store(report.nominal.as_nanos(), Ordering::Relaxed);
        self.next_deadline_ns
            .store(report.next_deadline.as_nanos(), Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> GeneratorSnapshot {
        GeneratorSnapshot {
            write_time_ns: self.write_time_ns.load(Ordering::Relaxed),
            timer_error_ns: self.timer_error_ns.load(Ordering::Relaxed),
            cycles: self.cycles.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            late: self.late.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            window_exceeded: self.window_exceeded.load(Ordering::Relaxed),
            max_delta_ns: self.max_delta_ns.load(Ordering::Relaxed),
            p50_delta_ns: self.p50_delta_ns.load(Ordering::Relaxed),
            p99_delta_ns: self.p99_delta_ns.load(Ordering::Relaxed),
            last_nominal_ns: self.last_nominal_ns.load(Ordering::Relaxed),
            next_deadline_ns: self.next_deadline_ns.load(Ordering::Relaxed),
            calibrated: self.calibrated.load(Ordering::Relaxed),
            running: self.running.load(Ordering::Relaxed),
        }
    }
}

/// An attached generator with its timer thread running.
#[derive(Debug)]
pub struct Generator {
    info: DeviceInfo,
    canceller: TimerCanceller,
    status: Arc<GeneratorStatus>,
    thread: Option<JoinHandle<()>>,
}

impl Generator {
    /// Bring up a generator on `port`.
    ///
    /// # Errors
    ///
    /// - [`AttachError::Config`] if `config` does not validate
    /// - [`AttachError::Calibration`] if every warm-up write failed
    /// - [`AttachError::Spawn`] if the timer thread could not be started
    ///
    /// On error nothing is left running and `port` is dropped.
    pub fn attach<P, C, T>(
        mut port: P,
        clock: C,
        timer: T,
        config: GeneratorConfig,
    ) -> Result<Self, AttachError>
    where
        P: PpsPort + 'static,
        C: WallClock + 'static,
        T: DeadlineTimer + 'static,
    {
        config.validate()?;
        let info = port.info().clone();

        let seed = i64::try_from(config.initial_write_time_ns).unwrap_or(i64::MAX);
        let mut calibrator = LatencyCalibrator::new(seed);
        if config.calibrate_on_attach {
            calibrator.warm_up(&mut port, &clock, config.warmup_samples)?;
        }

        let scheduler = EdgeScheduler::new(clock, calibrator, config.send_delay_ns, config.max_hold_ns);
        let first_deadline = scheduler.first_deadline(scheduler.clock().now());

        let status = Arc::new(GeneratorStatus::new());
        status.set_estimates(scheduler.calibrator());
        status
            .next_deadline_ns
            .store(first_deadline.as_nanos(), Ordering::Relaxed);
        status.running.store(true, Ordering::Relaxed);

        let canceller = timer.canceller();
        let thread_status = Arc::clone(&status);
        let rt = config.rt.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("fx3pps-gen-{}", info.key))
            .spawn(move || {
                run_timer_thread(port, scheduler, timer, first_deadline, &rt, &thread_status);
            });
        let thread = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                status.running.store(false, Ordering::Relaxed);
                return Err(AttachError::spawn(&e));
            }
        };

        info!(
            device = %info.key,
            send_delay_ns = config.send_delay_ns,
            write_time_ns = status.snapshot().write_time_ns,
            first_deadline = %first_deadline,
            "Generator attached"
        );

        Ok(Self {
            info,
            canceller,
            status,
            thread: Some(thread),
        })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Shared live status.
    pub fn status(&self) -> Arc<GeneratorStatus> {
        Arc::clone(&self.status)
    }

    pub fn snapshot(&self) -> GeneratorSnapshot {
        self.status.snapshot()
    }

    /// Cancel the timer, wait for the thread to exit, and return the final status.
    pub fn detach(mut self) -> GeneratorSnapshot {
        self.shutdown();
        self.status.snapshot()
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.canceller.cancel();
        if thread.join().is_err() {
            warn!(device = %self.info.key, "Generator thread panicked");
        }
        self.status.running.store(false, Ordering::Relaxed);
        info!(device = %self.info.key, "Generator detached");
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer_thread<P, C, T>(
    mut port: P,
    mut scheduler: EdgeScheduler<C>,
    mut timer: T,
    first_deadline: WallTime,
    rt: &rt_setup::RtSetup,
    status: &GeneratorStatus,
) where
    P: PpsPort,
    C: WallClock,
    T: DeadlineTimer,
{
    let applied = rt_setup::apply(rt);
    debug!(device = %port.info().key, ?applied, "Timer thread RT setup");

    let mut deadline = first_deadline;
    while timer.wait_until(deadline) == TimerWait::Fired {
        let report = scheduler.on_timer_fire(deadline, &mut port);
        status.publish(&report, scheduler.stats_mut());
        deadline = report.next_deadline;
    }
    debug!(device = %port.info().key, cycles = scheduler.stats().cycles, "Timer thread exiting");
}
