//! In-process simulated motor controller for CI/CD testing without physical
//! hardware.
//!
//! [`SimChannel`] implements [`HardwareChannel`] and records every command it
//! receives.  Because the channel itself is moved into its owning actuator or
//! mechanism, all inspection and fault injection goes through a cloneable
//! [`SimProbe`] that shares the channel's state.
//!
//! # Example
//!
//! ```rust
//! use gearbox_hal::channel::HardwareChannel;
//! use gearbox_hal::sim::SimChannel;
//! use gearbox_types::ClosedLoopTarget;
//!
//! let (mut channel, probe) = SimChannel::new(7);
//! channel.set_reference(ClosedLoopTarget::Position(1.0)).unwrap();
//! assert_eq!(probe.reference_writes(), vec![ClosedLoopTarget::Position(1.0)]);
//!
//! probe.disconnect();
//! assert!(channel.set_output(0.5).is_err());
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use gearbox_types::{ClosedLoopTarget, GainParam, Gains, GearError};

use crate::channel::HardwareChannel;
use crate::pid::PidController;

/// Nominal battery voltage reported by every simulated channel.
const NOMINAL_BUS_VOLTAGE: f64 = 12.0;
/// Free speed of the simulated motor at full output, in rotations per second.
const FREE_SPEED_RPS: f64 = 94.6;
/// Current drawn per unit of output fraction, in amps.
const AMPS_PER_OUTPUT: f64 = 40.0;

// ────────────────────────────────────────────────────────────────────────────
// Shared state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SimState {
    output: f64,
    gains: Gains,
    reference: Option<ClosedLoopTarget>,
    gain_writes: Vec<(GainParam, f64)>,
    reference_writes: Vec<ClosedLoopTarget>,
    output_writes: Vec<f64>,
    writes_fail: bool,
    reads_fail: bool,
    failing_param: Option<GainParam>,
    position: f64,
    velocity: f64,
    pid: PidController,
}

impl SimState {
    fn new() -> Self {
        let gains = Gains::pid(0.0, 0.0, 0.0);
        Self {
            output: 0.0,
            gains,
            reference: None,
            gain_writes: Vec::new(),
            reference_writes: Vec::new(),
            output_writes: Vec::new(),
            writes_fail: false,
            reads_fail: false,
            failing_param: None,
            position: 0.0,
            velocity: 0.0,
            pid: PidController::new(gains),
        }
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    // Simulation state stays usable after a panicking test thread.
    state.lock().unwrap_or_else(|e| e.into_inner())
}

// ────────────────────────────────────────────────────────────────────────────
// SimChannel
// ────────────────────────────────────────────────────────────────────────────

/// A simulated motor controller channel.  Succeeds unless a fault has been
/// injected through its [`SimProbe`].
#[derive(Debug)]
pub struct SimChannel {
    id: u32,
    state: Arc<Mutex<SimState>>,
}

impl SimChannel {
    /// Create a channel with the given hardware id, plus a probe sharing its
    /// state.
    pub fn new(id: u32) -> (Self, SimProbe) {
        let state = Arc::new(Mutex::new(SimState::new()));
        let probe = SimProbe {
            id,
            state: Arc::clone(&state),
        };
        (Self { id, state }, probe)
    }

    fn write_fault(&self, details: &str) -> GearError {
        GearError::HardwareWrite {
            channel: self.id,
            details: details.to_string(),
        }
    }

    fn read_fault(&self) -> GearError {
        GearError::HardwareRead {
            channel: self.id,
            details: "simulated link is disconnected".to_string(),
        }
    }
}

impl HardwareChannel for SimChannel {
    fn id(&self) -> u32 {
        self.id
    }

    fn set_output(&mut self, fraction: f64) -> Result<(), GearError> {
        let mut s = lock(&self.state);
        if s.writes_fail {
            return Err(self.write_fault("simulated link is disconnected"));
        }
        let fraction = fraction.clamp(-1.0, 1.0);
        s.output = fraction;
        s.reference = None;
        s.output_writes.push(fraction);
        Ok(())
    }

    fn write_gain(&mut self, param: GainParam, value: f64) -> Result<(), GearError> {
        let mut s = lock(&self.state);
        if s.writes_fail {
            return Err(self.write_fault("simulated link is disconnected"));
        }
        if s.failing_param == Some(param) {
            return Err(self.write_fault(&format!("simulated fault writing {}", param.label())));
        }
        s.gains.set(param, value);
        s.gain_writes.push((param, value));
        Ok(())
    }

    fn read_gain(&self, param: GainParam) -> Result<f64, GearError> {
        let s = lock(&self.state);
        if s.reads_fail {
            return Err(self.read_fault());
        }
        Ok(s.gains.get(param))
    }

    fn set_reference(&mut self, target: ClosedLoopTarget) -> Result<(), GearError> {
        let mut s = lock(&self.state);
        if s.writes_fail {
            return Err(self.write_fault("simulated link is disconnected"));
        }
        s.reference = Some(target);
        s.reference_writes.push(target);
        Ok(())
    }

    fn bus_voltage(&self) -> Result<f64, GearError> {
        let s = lock(&self.state);
        if s.reads_fail {
            return Err(self.read_fault());
        }
        Ok(NOMINAL_BUS_VOLTAGE)
    }

    fn output_current(&self) -> Result<f64, GearError> {
        let s = lock(&self.state);
        if s.reads_fail {
            return Err(self.read_fault());
        }
        Ok(s.output.abs() * AMPS_PER_OUTPUT)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimProbe
// ────────────────────────────────────────────────────────────────────────────

/// Inspection and fault-injection handle for a [`SimChannel`].
#[derive(Debug, Clone)]
pub struct SimProbe {
    id: u32,
    state: Arc<Mutex<SimState>>,
}

impl SimProbe {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Last commanded output fraction (open-loop, or the simulated PID output
    /// after [`step`][Self::step]).
    pub fn output(&self) -> f64 {
        lock(&self.state).output
    }

    /// Gain tuple currently held by the simulated controller.
    pub fn gains(&self) -> Gains {
        lock(&self.state).gains
    }

    /// Active closed-loop reference, `None` while in open-loop mode.
    pub fn reference(&self) -> Option<ClosedLoopTarget> {
        lock(&self.state).reference
    }

    /// Every gain write received, in order.
    pub fn gain_writes(&self) -> Vec<(GainParam, f64)> {
        lock(&self.state).gain_writes.clone()
    }

    /// Every closed-loop reference write received, in order.
    pub fn reference_writes(&self) -> Vec<ClosedLoopTarget> {
        lock(&self.state).reference_writes.clone()
    }

    /// Every open-loop output write received, in order.
    pub fn output_writes(&self) -> Vec<f64> {
        lock(&self.state).output_writes.clone()
    }

    /// Simulated mechanism position in rotations.
    pub fn position(&self) -> f64 {
        lock(&self.state).position
    }

    /// Forget all recorded writes.  Controller state is kept.
    pub fn clear_history(&self) {
        let mut s = lock(&self.state);
        s.gain_writes.clear();
        s.reference_writes.clear();
        s.output_writes.clear();
    }

    /// Make every write and read fail until [`reconnect`][Self::reconnect].
    pub fn disconnect(&self) {
        let mut s = lock(&self.state);
        s.writes_fail = true;
        s.reads_fail = true;
    }

    pub fn reconnect(&self) {
        let mut s = lock(&self.state);
        s.writes_fail = false;
        s.reads_fail = false;
        s.failing_param = None;
    }

    /// Fail reads only; writes keep working.
    pub fn fail_reads(&self, fail: bool) {
        lock(&self.state).reads_fail = fail;
    }

    /// Fail writes of a single gain parameter, leaving the others working.
    pub fn fail_gain_write(&self, param: GainParam) {
        lock(&self.state).failing_param = Some(param);
    }

    /// Advance the simulated plant by `dt` seconds.
    ///
    /// In closed-loop mode the on-board PID computes the output from the
    /// active reference and the controller's current gains; in open-loop mode
    /// the last commanded output is applied unchanged.
    pub fn step(&self, dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let mut s = lock(&self.state);
        if let Some(target) = s.reference {
            let gains = s.gains;
            let measurement = match target {
                ClosedLoopTarget::Position(_) => s.position,
                ClosedLoopTarget::Velocity(_) => s.velocity,
            };
            s.pid.set_gains(gains);
            s.pid.set_set_point(target.value());
            s.output = s.pid.update(measurement, dt);
        }
        s.velocity = s.output * FREE_SPEED_RPS;
        s.position += s.velocity * dt;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
