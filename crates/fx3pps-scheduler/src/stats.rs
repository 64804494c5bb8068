//! Per-cycle statistics for the edge scheduler.
//!
//! Keeps counters for every cycle outcome plus a bounded ring buffer of recent
//! timer deltas. The timer thread publishes the counters and the p50/p99 wake-up
//! delta into [`GeneratorStatus`](crate::GeneratorStatus) after each cycle, once
//! both edges are written.
//!
//! # RT-Safety
//!
//! - `record` is O(1); the ring buffer is allocated up front
//! - Percentile queries reuse a scratch buffer and never allocate

use crate::edge::CycleOutcome;

/// Counters and recent timer deltas for one generator.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles run
    pub cycles: u64,

    /// Cycles that wrote both edges
    pub completed: u64,

    /// Cycles skipped because the timer woke past the safety limit
    pub late: u64,

    /// Cycles with a failed edge write
    pub transport_failures: u64,

    /// Cycles cut short by the critical-window cap
    pub window_exceeded: u64,

    /// Largest observed timer delta (ns)
    pub max_delta_ns: u64,

    recent_deltas: Vec<u64>,
    max_samples: usize,
    next_sample_index: usize,
    percentile_scratch: Vec<u64>,
}

impl Default for CycleStats {
    fn default() -> Self {
        // Ten minutes of cycles
        Self::with_capacity(600)
    }
}

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_samples: usize) -> Self {
        Self {
            cycles: 0,
            completed: 0,
            late: 0,
            transport_failures: 0,
            window_exceeded: 0,
            max_delta_ns: 0,
            recent_deltas: Vec::with_capacity(max_samples),
            max_samples,
            next_sample_index: 0,
            percentile_scratch: Vec::with_capacity(max_samples),
        }
    }

    /// Record one cycle with its timer delta, early wake-ups counted as zero.
    pub fn record(&mut self, outcome: &CycleOutcome, delta_ns: u64) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Completed { .. } => self.completed += 1,
            CycleOutcome::Late => self.late += 1,
            CycleOutcome::TransportFailed { .. } => self.transport_failures += 1,
            CycleOutcome::WindowExceeded { .. } => self.window_exceeded += 1,
        }

        self.max_delta_ns = self.max_delta_ns.max(delta_ns);

        if self.max_samples == 0 {
            return;
        }

        if self.recent_deltas.len() < self.max_samples {
            self.recent_deltas.push(delta_ns);
            if self.recent_deltas.len() == self.max_samples {
                self.next_sample_index = 0;
            }
        } else {
            self.recent_deltas[self.next_sample_index] = delta_ns;
            self.next_sample_index = (self.next_sample_index + 1) % self.max_samples;
        }
    }

    /// Percentile (0.0 to 1.0) of recent timer deltas, or 0 with no samples.
    pub fn percentile_delta_ns(&mut self, percentile: f64) -> u64 {
        if self.recent_deltas.is_empty() {
            return 0;
        }

        let percentile = percentile.clamp(0.0, 1.0);

        self.percentile_scratch.clear();
        self.percentile_scratch.extend_from_slice(&self.recent_deltas);

        let len = self.percentile_scratch.len();
        let index = ((len as f64 * percentile) as usize).min(len.saturating_sub(1));
        let (_, value, _) = self.percentile_scratch.select_nth_unstable(index);
        *value
    }

    pub fn p99_delta_ns(&mut self) -> u64 {
        self.percentile_delta_ns(0.99)
    }

    pub fn p50_delta_ns(&mut self) -> u64 {
        self.percentile_delta_ns(0.50)
    }
}
