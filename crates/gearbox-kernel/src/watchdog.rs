//! [`LoopWatchdog`] – control-loop overrun monitor.
//!
//! The scheduler starts the watchdog at the top of every tick and records an
//! *epoch* after each behavior and each mechanism `periodic` call.  When the
//! tick finishes, the total wall time is compared against the loop period;
//! on an overrun the slowest epoch is reported so the offending behavior or
//! mechanism can be found from the log alone.

use std::time::{Duration, Instant};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Outcome of one timed tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopHealth {
    /// The tick finished inside its budget.
    OnTime,
    /// The tick exceeded its budget.
    Overrun {
        elapsed: Duration,
        /// Name and duration of the slowest recorded epoch, if any.
        slowest: Option<(String, Duration)>,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// LoopWatchdog
// ────────────────────────────────────────────────────────────────────────────

/// Times a tick against a fixed budget.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gearbox_kernel::watchdog::{LoopHealth, LoopWatchdog};
///
/// let mut wd = LoopWatchdog::new(Duration::from_secs(1));
/// wd.start();
/// wd.add_epoch("collector");
/// assert_eq!(wd.finish(), LoopHealth::OnTime);
/// ```
#[derive(Debug)]
pub struct LoopWatchdog {
    timeout: Duration,
    started: Instant,
    last_epoch: Instant,
    epochs: Vec<(String, Duration)>,
    overruns: u64,
}

impl LoopWatchdog {
    pub fn new(timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            timeout,
            started: now,
            last_epoch: now,
            epochs: Vec::new(),
            overruns: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Begin timing a new tick, discarding the previous tick's epochs.
    pub fn start(&mut self) {
        let now = Instant::now();
        self.started = now;
        self.last_epoch = now;
        self.epochs.clear();
    }

    /// Record the time spent since the previous epoch (or since
    /// [`start`][Self::start]) under `name`.
    pub fn add_epoch(&mut self, name: &str) {
        let now = Instant::now();
        self.epochs.push((name.to_string(), now - self.last_epoch));
        self.last_epoch = now;
    }

    /// Epochs recorded so far in the current tick, in order.
    pub fn epochs(&self) -> &[(String, Duration)] {
        &self.epochs
    }

    /// Stop timing and classify the tick.
    pub fn finish(&mut self) -> LoopHealth {
        let elapsed = self.started.elapsed();
        if elapsed <= self.timeout {
            return LoopHealth::OnTime;
        }
        self.overruns += 1;
        let slowest = self
            .epochs
            .iter()
            .max_by_key(|(_, d)| *d)
            .cloned();
        LoopHealth::Overrun { elapsed, slowest }
    }

    /// Number of overrun ticks since construction.
    pub fn overrun_count(&self) -> u64 {
        self.overruns
    }
}
