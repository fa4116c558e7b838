//! [`RobotLoop`] – fixed-period driver for the simulated robot.
//!
//! Owns the scheduler, both mechanisms and the telemetry store, and paces
//! ticks at the configured period.  Each [`step`][RobotLoop::step] first
//! advances the simulated plants by one period and then runs one scheduler
//! tick, so hardware state seen by behaviors always reflects the previous
//! cycle's commands.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use gearbox_hal::{MemoryTelemetryStore, SimChannel, SimProbe, TelemetryStore};
use gearbox_kernel::{BehaviorExt, BehaviorHandle, Clock, MonotonicClock, Scheduler};
use gearbox_types::{GearError, TelemetryValue};
use tracing::{debug, info};

use crate::autonomous::{autonomous_routine, stop_collector};
use crate::climber::Climber;
use crate::collector::Collector;
use crate::config::RobotConfig;

pub struct RobotLoop {
    config: RobotConfig,
    scheduler: Scheduler,
    store: Arc<MemoryTelemetryStore>,
    collector: Rc<RefCell<Collector>>,
    climber: Rc<RefCell<Climber>>,
    collector_probe: SimProbe,
    climber_probe: SimProbe,
    autonomous: Option<BehaviorHandle>,
    ticks: u64,
}

impl RobotLoop {
    /// Build the robot on simulated channels, timed by the wall clock.
    ///
    /// # Errors
    ///
    /// [`GearError::InvalidRange`] if `config` fails validation, or any
    /// error from writing the climber's initial gains.
    pub fn simulated(config: RobotConfig) -> Result<Self, GearError> {
        Self::simulated_with_clock(config, Box::new(MonotonicClock::new()))
    }

    /// Like [`simulated`][Self::simulated] on an injected clock.
    pub fn simulated_with_clock(config: RobotConfig, clock: Box<dyn Clock>) -> Result<Self, GearError> {
        config.validate()?;

        let store = Arc::new(MemoryTelemetryStore::new());
        let shared_store: Arc<dyn TelemetryStore> = store.clone();

        let (collector_channel, collector_probe) = SimChannel::new(config.collector.channel);
        let (climber_channel, climber_probe) = SimChannel::new(config.climber.channel);

        let collector = Rc::new(RefCell::new(Collector::from_config(
            &config.collector,
            Box::new(collector_channel),
            Arc::clone(&shared_store),
        )?));
        let climber = Rc::new(RefCell::new(Climber::from_config(
            &config.climber,
            Box::new(climber_channel),
            shared_store,
        )?));

        let mut scheduler = Scheduler::with_clock(clock, config.period());
        scheduler.register_mechanism(collector.clone());
        scheduler.register_mechanism(climber.clone());

        let idle = Rc::clone(&collector);
        scheduler.set_default_behavior(config.collector.name.as_str(), move || {
            stop_collector(Rc::clone(&idle)).boxed()
        });

        info!(
            period_ms = config.period_ms,
            collector = %config.collector.name,
            climber = %config.climber.name,
            "simulated robot ready"
        );

        Ok(Self {
            config,
            scheduler,
            store,
            collector,
            climber,
            collector_probe,
            climber_probe,
            autonomous: None,
            ticks: 0,
        })
    }

    // -------------------------------------------------------------------------
    // Modes
    // -------------------------------------------------------------------------

    /// Schedule the timed autonomous routine, replacing any running one.
    pub fn start_autonomous(&mut self) -> BehaviorHandle {
        if let Some(previous) = self.autonomous.take() {
            self.scheduler.cancel(previous);
        }
        let routine = autonomous_routine(
            Rc::clone(&self.collector),
            Rc::clone(&self.climber),
            self.config.autonomous_duration(),
        );
        let handle = self.scheduler.schedule(routine.boxed());
        info!(
            handle = %handle,
            seconds = self.config.autonomous_seconds,
            "autonomous started"
        );
        self.autonomous = Some(handle);
        handle
    }

    pub fn autonomous_running(&self) -> bool {
        self.autonomous.is_some_and(|h| self.scheduler.is_scheduled(h))
    }

    /// End every running behavior.
    pub fn stop(&mut self) {
        info!("stopping all behaviors");
        self.scheduler.cancel_all();
        self.autonomous = None;
    }

    // -------------------------------------------------------------------------
    // Loop
    // -------------------------------------------------------------------------

    /// Advance the plants by one period and run one scheduler tick.
    pub fn step(&mut self) {
        let dt = self.config.period().as_secs_f64();
        self.collector_probe.step(dt);
        self.climber_probe.step(dt);
        self.scheduler.tick();
        self.ticks += 1;
    }

    /// Step at the configured period until `shutdown` is set.  Returns the
    /// number of ticks run.
    pub fn run_until(&mut self, shutdown: &AtomicBool) -> u64 {
        self.run_while(shutdown, |_| true)
    }

    /// Step at the configured period while `keep_going` holds and `shutdown`
    /// is unset.  Sleeps only between ticks.
    pub fn run_while(&mut self, shutdown: &AtomicBool, keep_going: impl Fn(&Self) -> bool) -> u64 {
        let period = self.config.period();
        let start = self.ticks;
        while !shutdown.load(Ordering::SeqCst) && keep_going(self) {
            let started = Instant::now();
            self.step();
            if let Some(rest) = period.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
        let ran = self.ticks - start;
        debug!(ticks = ran, "robot loop exited");
        ran
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn store(&self) -> Arc<MemoryTelemetryStore> {
        Arc::clone(&self.store)
    }

    pub fn collector(&self) -> Rc<RefCell<Collector>> {
        Rc::clone(&self.collector)
    }

    pub fn climber(&self) -> Rc<RefCell<Climber>> {
        Rc::clone(&self.climber)
    }

    pub fn collector_probe(&self) -> &SimProbe {
        &self.collector_probe
    }

    pub fn climber_probe(&self) -> &SimProbe {
        &self.climber_probe
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Every telemetry key and its latest value.
    pub fn snapshot(&self) -> BTreeMap<String, TelemetryValue> {
        self.store.snapshot()
    }

    /// Time elapsed on the scheduler's clock.
    pub fn elapsed(&self) -> Duration {
        self.scheduler.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gearbox_kernel::ManualClock;
    use gearbox_types::{ClosedLoopTarget, Gains};

    fn robot(config: RobotConfig) -> (RobotLoop, ManualClock) {
        let clock = ManualClock::new();
        let robot = RobotLoop::simulated_with_clock(config, Box::new(clock.clone())).expect("valid config");
        (robot, clock)
    }

    fn step(robot: &mut RobotLoop, clock: &ManualClock) {
        clock.advance(robot.config().period());
        robot.step();
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = RobotConfig::default();
        config.collector.engaged_output = -0.1;
        assert!(matches!(
            RobotLoop::simulated(config),
            Err(GearError::InvalidRange { .. })
        ));
    }

    #[test]
    fn oversized_autonomous_duration_is_rejected() {
        let mut config = RobotConfig::default();
        config.autonomous_seconds = 1e20;
        assert!(matches!(
            RobotLoop::simulated(config),
            Err(GearError::InvalidRange { .. })
        ));
    }

    #[test]
    fn construction_registers_mechanisms_and_publishes_gains() {
        let (robot, _clock) = robot(RobotConfig::default());
        assert!(robot.scheduler().is_registered(&"collector".into()));
        assert!(robot.scheduler().is_registered(&"climber".into()));
        assert_eq!(
            robot.store().get_number("climber P Gain", -1.0),
            RobotConfig::default().climber.gains.p
        );
    }

    #[test]
    fn idle_robot_keeps_collector_stopped() {
        let (mut robot, clock) = robot(RobotConfig::default());
        step(&mut robot, &clock);

        assert_eq!(robot.scheduler().active_names(), vec!["stop collector"]);
        assert_eq!(robot.collector_probe().output(), 0.0);
        assert!(!robot.store().get_boolean("collector Engaged", true));
    }

    #[test]
    fn autonomous_runs_for_configured_duration() {
        let mut config = RobotConfig::default();
        config.autonomous_seconds = 0.1;
        config.climber.hold_angle = 2.0;
        let (mut robot, clock) = robot(config);
        step(&mut robot, &clock);

        robot.start_autonomous();
        assert!(robot.autonomous_running());
        assert_eq!(robot.collector_probe().output(), 0.65);
        assert_eq!(
            robot.climber_probe().reference(),
            Some(ClosedLoopTarget::Position(2.0))
        );

        // 0.1 s at 20 ms is five ticks.
        for _ in 0..4 {
            step(&mut robot, &clock);
            assert!(robot.autonomous_running());
        }
        step(&mut robot, &clock);
        assert!(!robot.autonomous_running());
        assert_eq!(robot.collector_probe().output(), 0.0);
        assert_eq!(robot.scheduler().active_names(), vec!["stop collector"]);
        assert!(robot.store().get_boolean("climber Held", false));
    }

    #[test]
    fn collector_read_failure_does_not_skip_climber_telemetry() {
        let (mut robot, clock) = robot(RobotConfig::default());
        assert!(!robot.snapshot().contains_key("climber Held"));

        // The collector is registered first, so its failing periodic runs
        // before the climber's.
        robot.collector_probe().fail_reads(true);
        step(&mut robot, &clock);

        let snapshot = robot.snapshot();
        assert!(!snapshot.contains_key("collector Voltage"));
        assert!(snapshot.contains_key("collector Engaged"));
        assert_eq!(snapshot.get("climber Held"), Some(&TelemetryValue::Boolean(false)));
        let store = robot.store();
        assert_eq!(store.get_number("climber Voltage", -1.0), 12.0);
        assert_eq!(
            store.get_number("climber P Gain", -1.0),
            RobotConfig::default().climber.gains.p
        );
    }

    #[test]
    fn held_climber_moves_toward_hold_angle() {
        let mut config = RobotConfig::default();
        config.climber.hold_angle = 1.0;
        config.climber.gains = Gains::pid(0.5, 0.0, 0.0);
        let (mut robot, clock) = robot(config);
        robot.start_autonomous();
        for _ in 0..20 {
            step(&mut robot, &clock);
        }
        assert!((robot.climber_probe().position() - 1.0).abs() < 0.05);
    }

    #[test]
    fn restarting_autonomous_cancels_the_previous_run() {
        let (mut robot, _clock) = robot(RobotConfig::default());
        let first = robot.start_autonomous();
        let second = robot.start_autonomous();
        assert!(!robot.scheduler().is_scheduled(first));
        assert!(robot.scheduler().is_scheduled(second));
    }

    #[test]
    fn stop_ends_everything() {
        let (mut robot, clock) = robot(RobotConfig::default());
        robot.start_autonomous();
        step(&mut robot, &clock);
        robot.stop();
        assert_eq!(robot.scheduler().active_count(), 0);
        assert!(!robot.collector().borrow().is_engaged());
    }

    #[test]
    fn run_until_returns_immediately_when_already_shut_down() {
        let (mut robot, _clock) = robot(RobotConfig::default());
        let shutdown = AtomicBool::new(true);
        assert_eq!(robot.run_until(&shutdown), 0);
    }

    #[test]
    fn run_while_stops_when_autonomous_ends() {
        let mut config = RobotConfig::default();
        config.period_ms = 1;
        config.autonomous_seconds = 0.01;
        let mut robot = RobotLoop::simulated(config).expect("valid config");
        robot.start_autonomous();

        let shutdown = AtomicBool::new(false);
        let ticks = robot.run_while(&shutdown, |r| r.autonomous_running());
        assert!(ticks >= 1);
        assert!(!robot.autonomous_running());
        assert!(robot.elapsed() >= Duration::from_millis(10));
    }
}
