//! Generic `HardwareChannel` trait for a single motor controller axis with a
//! native closed-loop PID.
//!
//! Drivers implement this trait and are handed, by value, to exactly one
//! owner: a [`ClosedLoopActuator`][crate::closed_loop::ClosedLoopActuator] or
//! an open-loop mechanism.  Nothing else holds a reference to the channel, so
//! every write to the hardware has a single, visible origin.

use gearbox_types::{ClosedLoopTarget, GainParam, GearError};

/// One physical motor controller channel (e.g. a CAN motor controller at a
/// fixed device id).
///
/// All calls are expected to complete without blocking the control loop.  A
/// disconnected link must be reported as
/// [`GearError::HardwareWrite`] or [`GearError::HardwareRead`], never as a
/// silent no-op.
pub trait HardwareChannel: Send {
    /// Stable hardware id for this channel, e.g. its CAN device id.
    fn id(&self) -> u32;

    /// Command an open-loop output fraction in `[-1, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`GearError::HardwareWrite`] when the link is down.
    fn set_output(&mut self, fraction: f64) -> Result<(), GearError>;

    /// Write one closed-loop tuning parameter to the controller.
    ///
    /// # Errors
    ///
    /// Returns [`GearError::HardwareWrite`] when the link is down.
    fn write_gain(&mut self, param: GainParam, value: f64) -> Result<(), GearError>;

    /// Read one closed-loop tuning parameter back from the controller.
    ///
    /// # Errors
    ///
    /// Returns [`GearError::HardwareRead`] when the link is down.
    fn read_gain(&self, param: GainParam) -> Result<f64, GearError>;

    /// Set the closed-loop reference the native controller drives toward.
    ///
    /// # Errors
    ///
    /// Returns [`GearError::HardwareWrite`] when the link is down.
    fn set_reference(&mut self, target: ClosedLoopTarget) -> Result<(), GearError>;

    /// Input (bus) voltage seen by the controller, in volts.
    fn bus_voltage(&self) -> Result<f64, GearError>;

    /// Motor output current, in amps.
    fn output_current(&self) -> Result<f64, GearError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process channel used only for tests.
    struct MockChannel {
        id: u32,
        output: f64,
        gains: [f64; 7],
        reference: Option<ClosedLoopTarget>,
    }

    impl MockChannel {
        fn new(id: u32) -> Self {
            Self {
                id,
                output: 0.0,
                gains: [0.0; 7],
                reference: None,
            }
        }

        fn slot(param: GainParam) -> usize {
            GainParam::ALL.iter().position(|p| *p == param).unwrap_or(0)
        }
    }

    impl HardwareChannel for MockChannel {
        fn id(&self) -> u32 {
            self.id
        }

        fn set_output(&mut self, fraction: f64) -> Result<(), GearError> {
            self.output = fraction;
            Ok(())
        }

        fn write_gain(&mut self, param: GainParam, value: f64) -> Result<(), GearError> {
            self.gains[Self::slot(param)] = value;
            Ok(())
        }

        fn read_gain(&self, param: GainParam) -> Result<f64, GearError> {
            Ok(self.gains[Self::slot(param)])
        }

        fn set_reference(&mut self, target: ClosedLoopTarget) -> Result<(), GearError> {
            self.reference = Some(target);
            Ok(())
        }

        fn bus_voltage(&self) -> Result<f64, GearError> {
            Ok(12.0)
        }

        fn output_current(&self) -> Result<f64, GearError> {
            Ok(self.output.abs() * 40.0)
        }
    }

    #[test]
    fn mock_channel_write_and_read_gain() {
        let mut ch = MockChannel::new(4);
        assert_eq!(ch.id(), 4);
        ch.write_gain(GainParam::FeedForward, 0.25).unwrap();
        assert_eq!(ch.read_gain(GainParam::FeedForward).unwrap(), 0.25);
        assert_eq!(ch.read_gain(GainParam::P).unwrap(), 0.0);

        ch.set_reference(ClosedLoopTarget::Position(3.0)).unwrap();
        assert_eq!(ch.reference, Some(ClosedLoopTarget::Position(3.0)));
    }

    #[test]
    fn mock_channel_as_trait_object() {
        let mut ch: Box<dyn HardwareChannel> = Box::new(MockChannel::new(9));
        ch.set_reference(ClosedLoopTarget::Velocity(120.0)).unwrap();
        ch.set_output(0.5).unwrap();
        assert!((ch.output_current().unwrap() - 20.0).abs() < f64::EPSILON);
    }
}
