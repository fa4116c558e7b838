//! Stock behaviors for the collector and climber.
//!
//! | Function                | Requires            | Lifetime                          |
//! |-------------------------|---------------------|-----------------------------------|
//! | [`autonomous_routine`]  | collector, climber  | fixed duration                    |
//! | [`run_collector`]       | collector           | until interrupted                 |
//! | [`stop_collector`]      | collector           | until interrupted (default slot)  |
//! | [`hold_climber`]        | climber             | one tick                          |
//!
//! Every behavior here captures a shared handle to the mechanism it drives
//! and only touches it from its lifecycle hooks, so the scheduler's
//! ownership map is the sole guard against two of them driving the same
//! motor.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use gearbox_kernel::{FunctionalBehavior, InstantBehavior, Mechanism, Timed};

use crate::climber::Climber;
use crate::collector::Collector;

/// Engage the collector and hold the climber for `duration`, then release
/// the collector.
///
/// The collector is disengaged whether the routine runs out or is
/// interrupted; the climber keeps its hold.
pub fn autonomous_routine(
    collector: Rc<RefCell<Collector>>,
    climber: Rc<RefCell<Climber>>,
    duration: Duration,
) -> Timed<FunctionalBehavior> {
    let collector_id = collector.borrow().id().clone();
    let climber_id = climber.borrow().id().clone();
    let on_init = Rc::clone(&collector);

    let body = FunctionalBehavior::new("autonomous")
        .requires(collector_id)
        .requires(climber_id)
        .on_initialize(move || {
            on_init.borrow_mut().set_engaged(true)?;
            climber.borrow_mut().set_held(true)
        })
        .on_end(move |_interrupted| collector.borrow_mut().set_engaged(false));

    Timed::new(body, duration)
}

/// Spin the collector until interrupted.
pub fn run_collector(collector: Rc<RefCell<Collector>>) -> FunctionalBehavior {
    let id = collector.borrow().id().clone();
    let on_init = Rc::clone(&collector);
    FunctionalBehavior::new("run collector")
        .requires(id)
        .on_initialize(move || on_init.borrow_mut().set_engaged(true))
        .on_end(move |_| collector.borrow_mut().set_engaged(false))
}

/// Keep the collector stopped.  Installed as the collector's default
/// behavior so it is idle whenever nothing else holds it.
pub fn stop_collector(collector: Rc<RefCell<Collector>>) -> FunctionalBehavior {
    let id = collector.borrow().id().clone();
    FunctionalBehavior::new("stop collector")
        .requires(id)
        .on_initialize(move || collector.borrow_mut().set_engaged(false))
}

/// Command the climber's hold once and finish.
pub fn hold_climber(climber: Rc<RefCell<Climber>>) -> InstantBehavior {
    let id = climber.borrow().id().clone();
    InstantBehavior::new("hold climber", move || climber.borrow_mut().set_held(true)).requires(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use gearbox_hal::{MemoryTelemetryStore, SimChannel, SimProbe};
    use gearbox_kernel::{Behavior, BehaviorExt, ManualClock, Scheduler};
    use gearbox_types::{ClosedLoopTarget, Gains, MechanismId};

    struct Rig {
        scheduler: Scheduler,
        clock: ManualClock,
        collector: Rc<RefCell<Collector>>,
        climber: Rc<RefCell<Climber>>,
        collector_probe: SimProbe,
        climber_probe: SimProbe,
    }

    fn rig() -> Rig {
        let store = Arc::new(MemoryTelemetryStore::new());
        let (collector_channel, collector_probe) = SimChannel::new(5);
        let (climber_channel, climber_probe) = SimChannel::new(6);
        let collector = Rc::new(RefCell::new(
            Collector::new("collector", Box::new(collector_channel), store.clone(), 0.65).unwrap(),
        ));
        let climber = Rc::new(RefCell::new(
            Climber::new("climber", Box::new(climber_channel), store, Gains::default(), 3.0)
                .unwrap(),
        ));
        climber_probe.clear_history();

        let clock = ManualClock::new();
        let mut scheduler = Scheduler::with_clock(Box::new(clock.clone()), Duration::from_millis(20));
        scheduler.register_mechanism(collector.clone());
        scheduler.register_mechanism(climber.clone());
        Rig {
            scheduler,
            clock,
            collector,
            climber,
            collector_probe,
            climber_probe,
        }
    }

    #[test]
    fn routine_requires_both_mechanisms() {
        let r = rig();
        let routine = autonomous_routine(r.collector.clone(), r.climber.clone(), Duration::from_secs(3));
        assert_eq!(
            routine.requirements(),
            vec![MechanismId::new("collector"), MechanismId::new("climber")]
        );
        assert_eq!(routine.name(), "autonomous");
    }

    #[test]
    fn routine_engages_holds_and_releases_after_duration() {
        let mut r = rig();
        let routine = autonomous_routine(r.collector.clone(), r.climber.clone(), Duration::from_secs(3));
        let h = r.scheduler.schedule(routine.boxed());

        assert_eq!(r.collector_probe.output(), 0.65);
        assert_eq!(r.climber_probe.reference_writes(), vec![ClosedLoopTarget::Position(3.0)]);

        r.clock.set(Duration::from_millis(2_990));
        r.scheduler.tick();
        assert!(r.scheduler.is_scheduled(h));
        assert!(r.collector.borrow().is_engaged());

        r.clock.set(Duration::from_millis(3_000));
        r.scheduler.tick();
        assert!(!r.scheduler.is_scheduled(h));
        assert!(!r.collector.borrow().is_engaged());
        assert_eq!(r.collector_probe.output(), 0.0);
        assert!(r.climber.borrow().is_held());
        assert_eq!(r.climber_probe.reference_writes().len(), 1);
    }

    #[test]
    fn interrupted_routine_still_releases_collector() {
        let mut r = rig();
        let routine = autonomous_routine(r.collector.clone(), r.climber.clone(), Duration::from_secs(3));
        r.scheduler.schedule(routine.boxed());

        let spin = r.scheduler.schedule(run_collector(r.collector.clone()).boxed());
        // The routine was evicted and released the collector, then `spin`
        // engaged it again.
        assert!(r.scheduler.is_scheduled(spin));
        assert_eq!(r.collector_probe.output_writes(), vec![0.65, 0.0, 0.65]);
        assert_eq!(r.scheduler.owner_of(&"climber".into()), None);
    }

    #[test]
    fn stop_collector_default_takes_over_when_idle() {
        let mut r = rig();
        let handle = r.collector.clone();
        r.scheduler
            .set_default_behavior("collector", move || stop_collector(handle.clone()).boxed());

        let spin = r.scheduler.schedule(run_collector(r.collector.clone()).boxed());
        assert!(r.collector.borrow().is_engaged());
        r.scheduler.cancel(spin);
        r.scheduler.tick();

        assert!(!r.collector.borrow().is_engaged());
        assert!(r.scheduler.owner_of(&"collector".into()).is_some());
        assert_eq!(r.scheduler.active_names(), vec!["stop collector"]);
    }

    #[test]
    fn hold_climber_finishes_after_one_tick() {
        let mut r = rig();
        let h = r.scheduler.schedule(hold_climber(r.climber.clone()).boxed());
        assert_eq!(r.climber_probe.reference_writes(), vec![ClosedLoopTarget::Position(3.0)]);
        r.scheduler.tick();
        assert!(!r.scheduler.is_scheduled(h));
    }

    #[test]
    fn disconnected_collector_fails_the_routine_without_stopping_the_loop() {
        let mut r = rig();
        r.collector_probe.disconnect();
        let routine = autonomous_routine(r.collector.clone(), r.climber.clone(), Duration::from_secs(3));
        let h = r.scheduler.schedule(routine.boxed());

        assert!(!r.scheduler.is_scheduled(h));
        assert!(r.climber_probe.reference_writes().is_empty());
        r.scheduler.tick();
        assert!(r.scheduler.is_registered(&"climber".into()));
    }
}
