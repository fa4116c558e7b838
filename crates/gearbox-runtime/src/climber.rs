//! [`Climber`] – position-held climbing arm on a closed-loop actuator.
//!
//! Gains are written once at construction.  `set_held(true)` commands a
//! single position reference at the hold angle and leaves the motor
//! controller to keep it there.  Releasing is deliberately not a hardware
//! command: `set_held(false)` only clears the flag.
//!
//! With `live_tuning` on, [`periodic`][Mechanism::periodic] pulls the gain
//! tuple back from the telemetry store every tick so it can be edited from
//! the dashboard.  Otherwise the climber only publishes it.

use std::sync::Arc;

use gearbox_hal::{ClosedLoopActuator, HardwareChannel, TelemetryStore};
use gearbox_kernel::Mechanism;
use gearbox_types::{Gains, GearError, MechanismId};
use tracing::{debug, warn};

use crate::config::ClimberConfig;

pub struct Climber {
    id: MechanismId,
    actuator: ClosedLoopActuator,
    store: Arc<dyn TelemetryStore>,
    hold_angle: f64,
    held: bool,
    live_tuning: bool,
}

impl Climber {
    /// Build the climber and write `gains` to the controller.  The gains are
    /// also published to `store`.
    ///
    /// # Errors
    ///
    /// [`GearError::InvalidRange`] for invalid gains or a non-finite hold
    /// angle, [`GearError::HardwareWrite`] if the initial gain write fails.
    pub fn new(
        id: impl Into<MechanismId>,
        channel: Box<dyn HardwareChannel>,
        store: Arc<dyn TelemetryStore>,
        gains: Gains,
        hold_angle: f64,
    ) -> Result<Self, GearError> {
        let id = id.into();
        check_angle(&id, hold_angle)?;
        let actuator = ClosedLoopActuator::new(channel, id.as_str(), gains)?;
        actuator.sync_to_store(store.as_ref());
        Ok(Self {
            id,
            actuator,
            store,
            hold_angle,
            held: false,
            live_tuning: false,
        })
    }

    pub fn from_config(
        config: &ClimberConfig,
        channel: Box<dyn HardwareChannel>,
        store: Arc<dyn TelemetryStore>,
    ) -> Result<Self, GearError> {
        Ok(Self::new(config.name.as_str(), channel, store, config.gains, config.hold_angle)?
            .with_live_tuning(config.live_tuning))
    }

    pub fn with_live_tuning(mut self, enabled: bool) -> Self {
        self.live_tuning = enabled;
        self
    }

    /// Hold the arm at the hold angle.  `true` issues exactly one position
    /// write; `false` issues none.
    ///
    /// # Errors
    ///
    /// [`GearError::HardwareWrite`] if the position write fails.
    pub fn set_held(&mut self, held: bool) -> Result<(), GearError> {
        if held {
            self.actuator.set_target_position(self.hold_angle)?;
            debug!(mechanism = %self.id, angle = self.hold_angle, "holding");
        }
        self.held = held;
        Ok(())
    }

    /// Change the angle used by the next `set_held(true)`.  Nothing is
    /// written to the controller.
    pub fn set_hold_angle(&mut self, rotations: f64) -> Result<(), GearError> {
        check_angle(&self.id, rotations)?;
        self.hold_angle = rotations;
        Ok(())
    }

    pub fn hold_angle(&self) -> f64 {
        self.hold_angle
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn live_tuning(&self) -> bool {
        self.live_tuning
    }

    pub fn actuator(&self) -> &ClosedLoopActuator {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut ClosedLoopActuator {
        &mut self.actuator
    }

    fn key(&self, field: &str) -> String {
        format!("{} {field}", self.id)
    }
}

fn check_angle(id: &MechanismId, rotations: f64) -> Result<(), GearError> {
    if rotations.is_finite() {
        Ok(())
    } else {
        Err(GearError::InvalidRange {
            component: id.to_string(),
            details: format!("hold angle {rotations} is not finite"),
        })
    }
}

impl Mechanism for Climber {
    fn id(&self) -> &MechanismId {
        &self.id
    }

    fn periodic(&mut self) {
        self.store.put_boolean(&self.key("Held"), self.held);
        match self.actuator.output_current() {
            Ok(amps) => self.store.put_number(&self.key("Current"), amps),
            Err(e) => warn!(mechanism = %self.id, error = %e, "skipping current telemetry"),
        }
        match self.actuator.bus_voltage() {
            Ok(volts) => self.store.put_number(&self.key("Voltage"), volts),
            Err(e) => warn!(mechanism = %self.id, error = %e, "skipping voltage telemetry"),
        }

        if self.live_tuning {
            // Rejections are logged by the actuator; the old tuple stays.
            if let Ok(true) = self.actuator.sync_from_store(self.store.as_ref()) {
                debug!(mechanism = %self.id, gains = ?self.actuator.gains(), "gains retuned from dashboard");
            }
        }
        self.actuator.sync_to_store(self.store.as_ref());
    }
}

impl std::fmt::Debug for Climber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Climber")
            .field("id", &self.id)
            .field("actuator", &self.actuator)
            .field("hold_angle", &self.hold_angle)
            .field("held", &self.held)
            .field("live_tuning", &self.live_tuning)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearbox_hal::{MemoryTelemetryStore, SimChannel, SimProbe};
    use gearbox_types::ClosedLoopTarget;

    fn climber(hold_angle: f64) -> (Climber, SimProbe, Arc<MemoryTelemetryStore>) {
        let (channel, probe) = SimChannel::new(6);
        let store = Arc::new(MemoryTelemetryStore::new());
        let c = Climber::new(
            "climber",
            Box::new(channel),
            store.clone(),
            Gains::pid(0.5, 0.0, 0.0),
            hold_angle,
        )
        .expect("valid climber");
        probe.clear_history();
        (c, probe, store)
    }

    #[test]
    fn construction_writes_and_publishes_gains() {
        let (channel, probe) = SimChannel::new(6);
        let store = Arc::new(MemoryTelemetryStore::new());
        let gains = Gains::pid(0.5, 0.01, 0.2);
        let _c = Climber::new("climber", Box::new(channel), store.clone(), gains, 1.0).unwrap();

        assert_eq!(probe.gains(), gains);
        assert_eq!(store.get_number("climber P Gain", -1.0), 0.5);
        assert_eq!(store.get_number("climber Max Output", -1.0), 1.0);
    }

    #[test]
    fn invalid_gains_fail_construction() {
        let (channel, probe) = SimChannel::new(6);
        let store = Arc::new(MemoryTelemetryStore::new());
        let bad = Gains::default().with_output_range(1.0, -1.0);
        assert!(Climber::new("climber", Box::new(channel), store, bad, 0.0).is_err());
        assert!(probe.gain_writes().is_empty());
    }

    #[test]
    fn hold_issues_one_position_write_at_hold_angle() {
        let (mut c, probe, _store) = climber(2.25);
        c.set_held(true).unwrap();

        assert_eq!(probe.reference_writes(), vec![ClosedLoopTarget::Position(2.25)]);
        assert!(probe.gain_writes().is_empty());
        assert!(c.is_held());
    }

    #[test]
    fn release_writes_nothing() {
        let (mut c, probe, _store) = climber(2.25);
        c.set_held(true).unwrap();
        probe.clear_history();

        c.set_held(false).unwrap();
        assert!(probe.reference_writes().is_empty());
        assert!(probe.output_writes().is_empty());
        assert!(probe.gain_writes().is_empty());
        assert!(!c.is_held());
        // The controller keeps its last reference.
        assert_eq!(probe.reference(), Some(ClosedLoopTarget::Position(2.25)));
    }

    #[test]
    fn new_hold_angle_applies_on_next_hold() {
        let (mut c, probe, _store) = climber(1.0);
        c.set_hold_angle(4.0).unwrap();
        assert!(probe.reference_writes().is_empty());

        c.set_held(true).unwrap();
        assert_eq!(probe.reference_writes(), vec![ClosedLoopTarget::Position(4.0)]);
        assert!(c.set_hold_angle(f64::NAN).is_err());
        assert_eq!(c.hold_angle(), 4.0);
    }

    #[test]
    fn periodic_publishes_state_and_gains() {
        let (mut c, _probe, store) = climber(1.0);
        c.set_held(true).unwrap();
        c.periodic();

        assert!(store.get_boolean("climber Held", false));
        assert_eq!(store.get_number("climber Voltage", -1.0), 12.0);
        assert!(store.get_number("climber Current", -1.0) >= 0.0);
        assert_eq!(store.get_number("climber P Gain", -1.0), 0.5);
    }

    #[test]
    fn dashboard_edits_are_ignored_without_live_tuning() {
        let (mut c, probe, store) = climber(1.0);
        store.put_number("climber P Gain", 0.9);
        c.periodic();

        assert!(probe.gain_writes().is_empty());
        assert_eq!(c.actuator().gains().p, 0.5);
        // The published value is restored.
        assert_eq!(store.get_number("climber P Gain", -1.0), 0.5);
    }

    #[test]
    fn live_tuning_applies_dashboard_edits() {
        let (c, probe, store) = climber(1.0);
        let mut c = c.with_live_tuning(true);
        store.put_number("climber P Gain", 0.9);
        c.periodic();

        assert_eq!(c.actuator().gains().p, 0.9);
        assert_eq!(probe.gains().p, 0.9);

        // An unchanged tuple on the next tick writes nothing.
        probe.clear_history();
        c.periodic();
        assert!(probe.gain_writes().is_empty());
    }

    #[test]
    fn live_tuning_rejects_inverted_range() {
        let (c, probe, store) = climber(1.0);
        let mut c = c.with_live_tuning(true);
        store.put_number("climber Min Output", 0.8);
        store.put_number("climber Max Output", 0.2);
        c.periodic();

        assert!(probe.gain_writes().is_empty());
        assert_eq!(c.actuator().gains().min_output, -1.0);
        assert_eq!(store.get_number("climber Min Output", 0.0), -1.0);
    }

    #[test]
    fn periodic_survives_read_failures() {
        let (mut c, probe, store) = climber(1.0);
        probe.fail_reads(true);
        c.periodic();

        assert!(!store.get_boolean("climber Held", true));
        assert_eq!(store.get_number("climber Voltage", -1.0), -1.0);
    }
}
