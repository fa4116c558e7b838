//! The `Mechanism` trait – a hardware module that behaviors borrow.
//!
//! A mechanism owns its actuators and exposes coarse, non-blocking commands.
//! It is created once, wrapped in a shared handle, handed to the
//! [`Scheduler`][crate::scheduler::Scheduler] for periodic calls, and cloned
//! into every behavior that needs to command it.  The scheduler, not the
//! handle, decides which behavior may use it at a given instant.

use std::cell::RefCell;
use std::rc::Rc;

use gearbox_types::MechanismId;

/// A stateful hardware module (collector, climber, …).
pub trait Mechanism {
    /// Stable identity used for ownership arbitration and registration.
    fn id(&self) -> &MechanismId;

    /// Called once per scheduler tick, after all behaviors have run, whether
    /// or not a behavior currently holds this mechanism.
    ///
    /// Must not fail: telemetry problems are logged and skipped here rather
    /// than surfaced to the scheduler.
    fn periodic(&mut self) {}
}

/// Type-erased handle the scheduler keeps for periodic calls.
pub type SharedMechanism = Rc<RefCell<dyn Mechanism>>;

/// Wrap `mechanism` in a shared handle.
///
/// The returned `Rc<RefCell<M>>` keeps its concrete type for behaviors, and
/// coerces to [`SharedMechanism`] for registration:
///
/// ```rust
/// use gearbox_kernel::mechanism::{shared, Mechanism, SharedMechanism};
/// use gearbox_types::MechanismId;
///
/// struct Intake(MechanismId);
/// impl Mechanism for Intake {
///     fn id(&self) -> &MechanismId { &self.0 }
/// }
///
/// let intake = shared(Intake("intake".into()));
/// let erased: SharedMechanism = intake.clone();
/// assert_eq!(erased.borrow().id().as_str(), "intake");
/// ```
pub fn shared<M: Mechanism + 'static>(mechanism: M) -> Rc<RefCell<M>> {
    Rc::new(RefCell::new(mechanism))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        id: MechanismId,
        calls: u32,
    }

    impl Mechanism for Counter {
        fn id(&self) -> &MechanismId {
            &self.id
        }

        fn periodic(&mut self) {
            self.calls += 1;
        }
    }

    #[test]
    fn erased_handle_reaches_concrete_state() {
        let counter = shared(Counter {
            id: "counter".into(),
            calls: 0,
        });
        let erased: SharedMechanism = counter.clone();
        erased.borrow_mut().periodic();
        erased.borrow_mut().periodic();
        assert_eq!(counter.borrow().calls, 2);
    }
}
