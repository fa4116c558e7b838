//! [`Collector`] – open-loop spinner that pulls game pieces in.
//!
//! The collector has two states.  Engaged, it drives its motor at a fixed
//! output fraction; disengaged, it commands zero.  There is no feedback loop.

use std::sync::Arc;

use gearbox_hal::{HardwareChannel, TelemetryStore};
use gearbox_kernel::Mechanism;
use gearbox_types::{GearError, MechanismId};
use tracing::{debug, warn};

use crate::config::CollectorConfig;

/// Output fraction used when none is configured.
pub const DEFAULT_ENGAGED_OUTPUT: f64 = 0.65;

pub struct Collector {
    id: MechanismId,
    channel: Box<dyn HardwareChannel>,
    store: Arc<dyn TelemetryStore>,
    engaged_output: f64,
    engaged: bool,
}

impl Collector {
    /// # Errors
    ///
    /// [`GearError::InvalidRange`] if `engaged_output` is outside `[0, 1]`.
    pub fn new(
        id: impl Into<MechanismId>,
        channel: Box<dyn HardwareChannel>,
        store: Arc<dyn TelemetryStore>,
        engaged_output: f64,
    ) -> Result<Self, GearError> {
        let id = id.into();
        if !(0.0..=1.0).contains(&engaged_output) {
            return Err(GearError::InvalidRange {
                component: id.to_string(),
                details: format!("engaged output {engaged_output} is outside [0, 1]"),
            });
        }
        Ok(Self {
            id,
            channel,
            store,
            engaged_output,
            engaged: false,
        })
    }

    pub fn from_config(
        config: &CollectorConfig,
        channel: Box<dyn HardwareChannel>,
        store: Arc<dyn TelemetryStore>,
    ) -> Result<Self, GearError> {
        Self::new(config.name.as_str(), channel, store, config.engaged_output)
    }

    /// Spin the collector (`true`) or stop it (`false`).  Calling it twice
    /// with the same value leaves the motor in the same state as once.
    ///
    /// # Errors
    ///
    /// [`GearError::HardwareWrite`] if the motor controller rejects the
    /// command; the engaged flag is left unchanged.
    pub fn set_engaged(&mut self, engaged: bool) -> Result<(), GearError> {
        let output = if engaged { self.engaged_output } else { 0.0 };
        self.channel.set_output(output)?;
        if self.engaged != engaged {
            debug!(mechanism = %self.id, engaged, output, "collector state changed");
        }
        self.engaged = engaged;
        Ok(())
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn engaged_output(&self) -> f64 {
        self.engaged_output
    }

    fn key(&self, field: &str) -> String {
        format!("{} {field}", self.id)
    }
}

impl Mechanism for Collector {
    fn id(&self) -> &MechanismId {
        &self.id
    }

    fn periodic(&mut self) {
        self.store.put_boolean(&self.key("Engaged"), self.engaged);
        match self.channel.output_current() {
            Ok(amps) => self.store.put_number(&self.key("Current"), amps),
            Err(e) => warn!(mechanism = %self.id, error = %e, "skipping current telemetry"),
        }
        match self.channel.bus_voltage() {
            Ok(volts) => self.store.put_number(&self.key("Voltage"), volts),
            Err(e) => warn!(mechanism = %self.id, error = %e, "skipping voltage telemetry"),
        }
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("id", &self.id)
            .field("channel", &self.channel.id())
            .field("engaged_output", &self.engaged_output)
            .field("engaged", &self.engaged)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearbox_hal::{MemoryTelemetryStore, SimChannel, SimProbe};

    fn collector() -> (Collector, SimProbe, Arc<MemoryTelemetryStore>) {
        let (channel, probe) = SimChannel::new(5);
        let store = Arc::new(MemoryTelemetryStore::new());
        let c = Collector::new("collector", Box::new(channel), store.clone(), DEFAULT_ENGAGED_OUTPUT)
            .expect("valid collector");
        (c, probe, store)
    }

    #[test]
    fn engage_drives_configured_output() {
        let (mut c, probe, _store) = collector();
        c.set_engaged(true).unwrap();
        assert!(c.is_engaged());
        assert_eq!(probe.output(), 0.65);

        c.set_engaged(false).unwrap();
        assert!(!c.is_engaged());
        assert_eq!(probe.output(), 0.0);
    }

    #[test]
    fn engaging_twice_is_the_same_as_once() {
        let (mut c, probe, _store) = collector();
        c.set_engaged(true).unwrap();
        let once = (c.is_engaged(), probe.output());
        c.set_engaged(true).unwrap();
        assert_eq!((c.is_engaged(), probe.output()), once);
    }

    #[test]
    fn out_of_range_output_is_rejected() {
        let (channel, _probe) = SimChannel::new(5);
        let store = Arc::new(MemoryTelemetryStore::new());
        let err = Collector::new("collector", Box::new(channel), store, 1.2).unwrap_err();
        assert!(matches!(err, GearError::InvalidRange { ref component, .. } if component == "collector"));
    }

    #[test]
    fn link_failure_surfaces_as_hardware_write() {
        let (mut c, probe, _store) = collector();
        probe.disconnect();
        assert!(matches!(
            c.set_engaged(true),
            Err(GearError::HardwareWrite { channel: 5, .. })
        ));
        assert!(!c.is_engaged());
    }

    #[test]
    fn periodic_publishes_state_current_and_voltage() {
        let (mut c, _probe, store) = collector();
        c.set_engaged(true).unwrap();
        c.periodic();

        assert!(store.get_boolean("collector Engaged", false));
        assert!(store.get_number("collector Current", -1.0) > 0.0);
        assert_eq!(store.get_number("collector Voltage", -1.0), 12.0);
    }

    #[test]
    fn periodic_skips_fields_when_reads_fail() {
        let (mut c, probe, store) = collector();
        probe.fail_reads(true);
        c.periodic();

        assert!(!store.get_boolean("collector Engaged", true));
        assert_eq!(store.get_number("collector Current", -1.0), -1.0);
        assert_eq!(store.get_number("collector Voltage", -1.0), -1.0);
    }
}
