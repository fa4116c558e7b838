//! [`ClosedLoopActuator`] – a single motor axis driven by its controller's
//! native PID loop, with runtime-tunable gains.
//!
//! The actuator is the only owner of its [`HardwareChannel`].  Every gain
//! setter validates first and then writes through to the channel before
//! returning, so a gain change is in effect from the controller's next loop
//! update.  Nothing is deferred or batched.
//!
//! # Live tuning
//!
//! [`ClosedLoopActuator::sync_to_store`] publishes the gain tuple to the
//! dashboard under `"<name> <label>"` keys, and
//! [`ClosedLoopActuator::sync_from_store`] reads them back.  The owning
//! mechanism calls `sync_from_store` once per tick from its `periodic` hook,
//! on the control thread, so it is ordered with respect to code-driven
//! [`set_gains`][ClosedLoopActuator::set_gains] calls by call order alone.
//!
//! # Example
//!
//! ```rust
//! use gearbox_hal::closed_loop::ClosedLoopActuator;
//! use gearbox_hal::sim::SimChannel;
//! use gearbox_types::Gains;
//!
//! let (channel, probe) = SimChannel::new(12);
//! let mut arm = ClosedLoopActuator::new(Box::new(channel), "arm", Gains::pid(0.4, 0.0, 0.0))?;
//!
//! arm.set_target_position(3.5)?;
//! assert_eq!(probe.gains().p, 0.4);
//! # Ok::<(), gearbox_types::GearError>(())
//! ```

use gearbox_types::{ClosedLoopTarget, GainParam, Gains, GearError};
use tracing::{debug, warn};

use crate::channel::HardwareChannel;
use crate::telemetry_store::TelemetryStore;

/// A hardware axis under closed-loop position or velocity control.
pub struct ClosedLoopActuator {
    name: String,
    channel: Box<dyn HardwareChannel>,
    gains: Gains,
    target: Option<ClosedLoopTarget>,
}

impl ClosedLoopActuator {
    /// Take ownership of `channel` and write the initial `gains` to it.
    ///
    /// # Errors
    ///
    /// [`GearError::InvalidRange`] if `gains` is invalid (nothing written),
    /// or [`GearError::HardwareWrite`] if the channel rejects a write.
    pub fn new(
        channel: Box<dyn HardwareChannel>,
        name: impl Into<String>,
        gains: Gains,
    ) -> Result<Self, GearError> {
        let name = name.into();
        gains.validate(&name)?;
        let mut actuator = Self {
            name,
            channel,
            gains,
            target: None,
        };
        actuator.write_all(&gains)?;
        Ok(actuator)
    }

    /// Construct with the default gain tuple and the name `"M<id>"`.
    pub fn with_defaults(channel: Box<dyn HardwareChannel>) -> Result<Self, GearError> {
        let name = format!("M{}", channel.id());
        Self::new(channel, name, Gains::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the actuator.  Only affects telemetry keys.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Hardware id of the owned channel.
    pub fn channel_id(&self) -> u32 {
        self.channel.id()
    }

    /// The gain tuple most recently written in full.
    pub fn gains(&self) -> Gains {
        self.gains
    }

    /// The most recently accepted closed-loop target, if any.
    pub fn target(&self) -> Option<ClosedLoopTarget> {
        self.target
    }

    // ------------------------------------------------------------------------
    // Gains
    // ------------------------------------------------------------------------

    /// Validate and write all seven parameters, in tuple order.
    ///
    /// # Errors
    ///
    /// - [`GearError::InvalidRange`] when `min_output > max_output`, the
    ///   I-zone is negative, or a field is non-finite.  No hardware write
    ///   happens.
    /// - [`GearError::HardwareWrite`] from the first failing write.  Writes
    ///   before it have reached the controller; the stored tuple is left at
    ///   its previous value until a retry succeeds.
    pub fn set_gains(&mut self, gains: Gains) -> Result<(), GearError> {
        gains.validate(&self.name)?;
        self.write_all(&gains)?;
        debug!(actuator = %self.name, ?gains, "gains written");
        self.gains = gains;
        Ok(())
    }

    pub fn set_p(&mut self, p: f64) -> Result<(), GearError> {
        self.set_one(GainParam::P, p)
    }

    pub fn set_i(&mut self, i: f64) -> Result<(), GearError> {
        self.set_one(GainParam::I, i)
    }

    pub fn set_d(&mut self, d: f64) -> Result<(), GearError> {
        self.set_one(GainParam::D, d)
    }

    pub fn set_i_zone(&mut self, i_zone: f64) -> Result<(), GearError> {
        self.set_one(GainParam::IZone, i_zone)
    }

    pub fn set_ff(&mut self, ff: f64) -> Result<(), GearError> {
        self.set_one(GainParam::FeedForward, ff)
    }

    /// Set both output bounds together.
    ///
    /// # Errors
    ///
    /// [`GearError::InvalidRange`] when `min > max`.
    pub fn set_output_range(&mut self, min: f64, max: f64) -> Result<(), GearError> {
        let candidate = self.gains.with_output_range(min, max);
        candidate.validate(&self.name)?;
        self.channel.write_gain(GainParam::MinOutput, min)?;
        self.channel.write_gain(GainParam::MaxOutput, max)?;
        self.gains = candidate;
        Ok(())
    }

    pub fn set_min_output(&mut self, min: f64) -> Result<(), GearError> {
        self.set_output_range(min, self.gains.max_output)
    }

    pub fn set_max_output(&mut self, max: f64) -> Result<(), GearError> {
        self.set_output_range(self.gains.min_output, max)
    }

    /// Read the full tuple back from the controller.
    ///
    /// # Errors
    ///
    /// [`GearError::HardwareRead`] when the link is down.
    pub fn read_hardware_gains(&self) -> Result<Gains, GearError> {
        let mut gains = self.gains;
        for param in GainParam::ALL {
            gains.set(param, self.channel.read_gain(param)?);
        }
        Ok(gains)
    }

    fn set_one(&mut self, param: GainParam, value: f64) -> Result<(), GearError> {
        let mut candidate = self.gains;
        candidate.set(param, value);
        candidate.validate(&self.name)?;
        self.channel.write_gain(param, value)?;
        self.gains = candidate;
        Ok(())
    }

    fn write_all(&mut self, gains: &Gains) -> Result<(), GearError> {
        for param in GainParam::ALL {
            self.channel.write_gain(param, gains.get(param))?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Targets
    // ------------------------------------------------------------------------

    /// Drive to `rotations` under closed-loop position control.
    pub fn set_target_position(&mut self, rotations: f64) -> Result<(), GearError> {
        self.set_target(ClosedLoopTarget::Position(rotations))
    }

    /// Drive at `units_per_sec` under closed-loop velocity control.
    pub fn set_target_velocity(&mut self, units_per_sec: f64) -> Result<(), GearError> {
        self.set_target(ClosedLoopTarget::Velocity(units_per_sec))
    }

    /// Issue a single reference write; the stored target only changes when
    /// the write succeeds.
    pub fn set_target(&mut self, target: ClosedLoopTarget) -> Result<(), GearError> {
        self.channel.set_reference(target)?;
        self.target = Some(target);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Telemetry
    // ------------------------------------------------------------------------

    pub fn bus_voltage(&self) -> Result<f64, GearError> {
        self.channel.bus_voltage()
    }

    pub fn output_current(&self) -> Result<f64, GearError> {
        self.channel.output_current()
    }

    /// Telemetry key for `param`, e.g. `"climber P Gain"`.
    pub fn gain_key(&self, param: GainParam) -> String {
        format!("{} {}", self.name, param.label())
    }

    /// Publish the current gain tuple to `store`.
    pub fn sync_to_store(&self, store: &dyn TelemetryStore) {
        for param in GainParam::ALL {
            store.put_number(&self.gain_key(param), self.gains.get(param));
        }
    }

    /// Pull the gain tuple from `store`, falling back to the current value for
    /// any missing key, and apply it through [`set_gains`][Self::set_gains].
    ///
    /// Returns `Ok(false)` without touching hardware when the tuple read is
    /// identical to the current one, `Ok(true)` after a successful update.
    ///
    /// # Errors
    ///
    /// Same as [`set_gains`][Self::set_gains]; an invalid tuple on the
    /// dashboard is rejected as a whole.
    pub fn sync_from_store(&mut self, store: &dyn TelemetryStore) -> Result<bool, GearError> {
        let mut incoming = self.gains;
        for param in GainParam::ALL {
            incoming.set(param, store.get_number(&self.gain_key(param), self.gains.get(param)));
        }
        if incoming == self.gains {
            return Ok(false);
        }
        if let Err(e) = self.set_gains(incoming) {
            warn!(actuator = %self.name, error = %e, "rejected gains from telemetry store");
            return Err(e);
        }
        Ok(true)
    }
}

impl std::fmt::Debug for ClosedLoopActuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosedLoopActuator")
            .field("name", &self.name)
            .field("channel", &self.channel.id())
            .field("gains", &self.gains)
            .field("target", &self.target)
            .finish()
    }
}
