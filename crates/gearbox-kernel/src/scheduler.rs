//! [`Scheduler`] – cooperative, fixed-rate behavior scheduler.
//!
//! The scheduler owns the registered mechanisms' periodic calls, the set of
//! running behaviors, and the map from each mechanism to the behavior that
//! currently holds it.  It runs on a single control thread: the robot runtime
//! calls [`Scheduler::tick`] once per period and calls
//! [`register_mechanism`][Scheduler::register_mechanism],
//! [`schedule`][Scheduler::schedule] and [`cancel`][Scheduler::cancel] in
//! between.  Nothing here locks or blocks.
//!
//! # Ownership
//!
//! At most one running behavior holds any given mechanism.  A newly
//! scheduled behavior always wins: every current holder of a mechanism it
//! requires is ended with `end(true)` before the newcomer's `initialize()`
//! runs.  Behaviors with disjoint requirements run side by side.
//!
//! # Tick order
//!
//! 1. For each running behavior, in admission order: `execute`, then
//!    `is_finished`, and if finished `end(false)` straight away, before the
//!    next behavior executes.  A behavior whose hook returned `Err` is logged
//!    and gets `end(true)` at the same point.
//! 2. Default behaviors are scheduled for mechanisms left without an owner.
//! 3. `periodic()` on every registered mechanism, in registration order.
//!
//! No error escapes `tick()`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use gearbox_types::MechanismId;
use tracing::{debug, error, info, instrument, warn};

use crate::behavior::{Behavior, BehaviorState, TickContext};
use crate::clock::{Clock, MonotonicClock};
use crate::mechanism::SharedMechanism;
use crate::watchdog::{LoopHealth, LoopWatchdog};

/// Nominal control-loop period.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(20);

// ─────────────────────────────────────────────────────────────────────────────
// Handles
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque reference to a scheduled behavior, returned by
/// [`Scheduler::schedule`].  Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BehaviorHandle(u64);

impl fmt::Display for BehaviorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type DefaultFactory = Box<dyn FnMut() -> Box<dyn Behavior>>;

struct Scheduled {
    handle: BehaviorHandle,
    name: String,
    behavior: Box<dyn Behavior>,
    requirements: Vec<MechanismId>,
    state: BehaviorState,
    admitted_at: Duration,
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Runs behaviors against exclusively-borrowed mechanisms, one tick at a time.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use gearbox_kernel::behavior::{BehaviorExt, Idle};
/// use gearbox_kernel::clock::ManualClock;
/// use gearbox_kernel::scheduler::Scheduler;
///
/// let clock = ManualClock::new();
/// let mut scheduler = Scheduler::with_clock(Box::new(clock.clone()), Duration::from_millis(20));
///
/// let wait = scheduler.schedule(Idle::new("wait").with_timeout(Duration::from_millis(40)).boxed());
/// clock.advance(Duration::from_millis(40));
/// scheduler.tick();
/// assert!(!scheduler.is_scheduled(wait));
/// ```
pub struct Scheduler {
    clock: Box<dyn Clock>,
    period: Duration,
    mechanisms: Vec<SharedMechanism>,
    registered: HashSet<MechanismId>,
    owners: HashMap<MechanismId, BehaviorHandle>,
    active: Vec<Scheduled>,
    defaults: BTreeMap<MechanismId, DefaultFactory>,
    next_handle: u64,
    watchdog: LoopWatchdog,
}

impl Scheduler {
    /// A scheduler on the wall clock.
    pub fn new(period: Duration) -> Self {
        Self::with_clock(Box::new(MonotonicClock::new()), period)
    }

    /// A scheduler on an injected clock (e.g. a
    /// [`ManualClock`][crate::clock::ManualClock] in tests).
    pub fn with_clock(clock: Box<dyn Clock>, period: Duration) -> Self {
        Self {
            clock,
            period,
            mechanisms: Vec::new(),
            registered: HashSet::new(),
            owners: HashMap::new(),
            active: Vec::new(),
            defaults: BTreeMap::new(),
            next_handle: 0,
            watchdog: LoopWatchdog::new(period),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Current reading of the scheduler's clock.
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    // -------------------------------------------------------------------------
    // Mechanisms
    // -------------------------------------------------------------------------

    /// Add `mechanism` to the periodic set.  Idempotent by
    /// [`MechanismId`]: registering the same id again is ignored and returns
    /// `false`.
    pub fn register_mechanism(&mut self, mechanism: SharedMechanism) -> bool {
        let id = mechanism.borrow().id().clone();
        if !self.registered.insert(id.clone()) {
            debug!(mechanism = %id, "mechanism already registered");
            return false;
        }
        info!(mechanism = %id, "mechanism registered");
        self.mechanisms.push(mechanism);
        true
    }

    pub fn is_registered(&self, id: &MechanismId) -> bool {
        self.registered.contains(id)
    }

    /// Install a factory whose behaviors run on `id` whenever nothing else
    /// holds it.  The factory is invoked after the behavior phase of a tick
    /// that leaves `id` unowned; the behavior it returns should require `id`.
    pub fn set_default_behavior(
        &mut self,
        id: impl Into<MechanismId>,
        factory: impl FnMut() -> Box<dyn Behavior> + 'static,
    ) {
        self.defaults.insert(id.into(), Box::new(factory));
    }

    pub fn clear_default_behavior(&mut self, id: &MechanismId) {
        self.defaults.remove(id);
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    /// Admit `behavior`, evicting the current holder of any mechanism it
    /// requires.
    ///
    /// Each evicted behavior receives exactly one `end(true)` before
    /// `behavior.initialize()` runs.  If `initialize` fails, the behavior is
    /// ended with `end(true)` and never reaches `Running`; the returned
    /// handle is then already inactive.
    pub fn schedule(&mut self, behavior: Box<dyn Behavior>) -> BehaviorHandle {
        let handle = BehaviorHandle(self.next_handle);
        self.next_handle += 1;

        let name = behavior.name().to_string();
        let mut requirements = behavior.requirements();
        requirements.sort();
        requirements.dedup();

        let evicted: Vec<BehaviorHandle> = self
            .active
            .iter()
            .filter(|s| s.requirements.iter().any(|r| requirements.contains(r)))
            .map(|s| s.handle)
            .collect();
        for victim in evicted {
            info!(behavior = %name, evicted = %victim, "interrupting current holder");
            self.finish(victim, true);
        }

        let mut entry = Scheduled {
            handle,
            name,
            behavior,
            requirements,
            state: BehaviorState::Initializing,
            admitted_at: self.clock.now(),
        };
        debug!(behavior = %entry.name, handle = %handle, "initializing");

        if let Err(e) = entry.behavior.initialize() {
            error!(behavior = %entry.name, error = %e, "initialize failed; ending behavior");
            Self::end_entry(&mut entry, true);
            return handle;
        }

        entry.state = BehaviorState::Running;
        for id in &entry.requirements {
            self.owners.insert(id.clone(), handle);
        }
        info!(behavior = %entry.name, handle = %handle, "scheduled");
        self.active.push(entry);
        handle
    }

    /// End a scheduled behavior with `end(true)`.  Returns `false` if the
    /// handle is not active.
    pub fn cancel(&mut self, handle: BehaviorHandle) -> bool {
        if !self.is_scheduled(handle) {
            return false;
        }
        info!(handle = %handle, "cancelling");
        self.finish(handle, true);
        true
    }

    /// Cancel every scheduled behavior, in admission order.
    pub fn cancel_all(&mut self) {
        let handles: Vec<BehaviorHandle> = self.active.iter().map(|s| s.handle).collect();
        for handle in handles {
            self.finish(handle, true);
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn is_scheduled(&self, handle: BehaviorHandle) -> bool {
        self.active.iter().any(|s| s.handle == handle)
    }

    /// Lifecycle state of `handle`; [`BehaviorState::Disabled`] once it has
    /// left the active set.
    pub fn state_of(&self, handle: BehaviorHandle) -> BehaviorState {
        self.active
            .iter()
            .find(|s| s.handle == handle)
            .map_or(BehaviorState::Disabled, |s| s.state)
    }

    /// Behavior currently holding mechanism `id`.
    pub fn owner_of(&self, id: &MechanismId) -> Option<BehaviorHandle> {
        self.owners.get(id).copied()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Names of the running behaviors, in admission order.
    pub fn active_names(&self) -> Vec<&str> {
        self.active.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn overrun_count(&self) -> u64 {
        self.watchdog.overrun_count()
    }

    // -------------------------------------------------------------------------
    // Tick
    // -------------------------------------------------------------------------

    /// Run one control cycle.  See the module docs for the exact order.
    #[instrument(level = "trace", skip(self))]
    pub fn tick(&mut self) {
        let now = self.clock.now();
        self.watchdog.start();

        // Finished entries are removed in place, so `idx` only advances past
        // entries that keep running.
        let mut idx = 0;
        while idx < self.active.len() {
            let entry = &mut self.active[idx];
            let ctx = TickContext {
                now,
                elapsed: now.saturating_sub(entry.admitted_at),
                period: self.period,
            };
            let outcome = match entry.behavior.execute(&ctx) {
                Ok(()) => entry.behavior.is_finished(&ctx).then_some(false),
                Err(e) => {
                    error!(behavior = %entry.name, error = %e, "execute failed; interrupting behavior");
                    Some(true)
                }
            };
            self.watchdog.add_epoch(&entry.name);
            match outcome {
                Some(interrupted) => self.finish_at(idx, interrupted),
                None => idx += 1,
            }
        }

        self.schedule_defaults();

        for mechanism in &self.mechanisms {
            match mechanism.try_borrow_mut() {
                Ok(mut m) => {
                    m.periodic();
                    self.watchdog.add_epoch(m.id().as_str());
                }
                Err(_) => {
                    warn!("mechanism is borrowed outside the scheduler; skipping periodic");
                }
            }
        }

        if let LoopHealth::Overrun { elapsed, slowest } = self.watchdog.finish() {
            let (slowest_name, slowest_time) = slowest.unwrap_or_default();
            warn!(
                elapsed_ms = elapsed.as_secs_f64() * 1e3,
                budget_ms = self.period.as_secs_f64() * 1e3,
                slowest = %slowest_name,
                slowest_ms = slowest_time.as_secs_f64() * 1e3,
                "loop overrun"
            );
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Remove `handle` from the active set, run its `end`, and release every
    /// mechanism it held.
    fn finish(&mut self, handle: BehaviorHandle, interrupted: bool) {
        if let Some(idx) = self.active.iter().position(|s| s.handle == handle) {
            self.finish_at(idx, interrupted);
        }
    }

    fn finish_at(&mut self, idx: usize, interrupted: bool) {
        let mut entry = self.active.remove(idx);
        Self::end_entry(&mut entry, interrupted);
        self.owners.retain(|_, owner| *owner != entry.handle);
    }

    fn end_entry(entry: &mut Scheduled, interrupted: bool) {
        entry.state = BehaviorState::Ending;
        if let Err(e) = entry.behavior.end(interrupted) {
            error!(behavior = %entry.name, error = %e, "end failed");
        }
        entry.state = BehaviorState::Disabled;
        debug!(behavior = %entry.name, handle = %entry.handle, interrupted, "ended");
    }

    fn schedule_defaults(&mut self) {
        let idle: Vec<MechanismId> = self
            .defaults
            .keys()
            .filter(|id| !self.owners.contains_key(*id))
            .cloned()
            .collect();
        for id in idle {
            // An earlier default in this pass may already have claimed `id`.
            if self.owners.contains_key(&id) {
                continue;
            }
            let Some(factory) = self.defaults.get_mut(&id) else {
                continue;
            };
            let behavior = factory();
            if !behavior.requirements().contains(&id) {
                warn!(mechanism = %id, behavior = %behavior.name(), "default behavior does not require its mechanism");
            }
            debug!(mechanism = %id, behavior = %behavior.name(), "scheduling default behavior");
            self.schedule(behavior);
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("period", &self.period)
            .field("mechanisms", &self.registered)
            .field("active", &self.active_names())
            .field("owners", &self.owners)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
