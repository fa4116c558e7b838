//! Behaviors – schedulable units of robot action.
//!
//! A behavior declares the mechanisms it needs exclusive use of and exposes
//! four lifecycle hooks.  The [`Scheduler`][crate::scheduler::Scheduler]
//! drives every behavior through the same state machine:
//!
//! | From           | To             | Trigger                                      |
//! |----------------|----------------|----------------------------------------------|
//! | `Disabled`     | `Initializing` | scheduled; `initialize()` runs once          |
//! | `Initializing` | `Running`      | immediately after `initialize()`             |
//! | `Running`      | `Running`      | each tick: `execute()` then `is_finished()`  |
//! | `Running`      | `Ending`       | finished, interrupted, cancelled or faulted  |
//! | `Ending`       | `Disabled`     | after `end(interrupted)` runs once           |
//!
//! Hooks must return promptly; none of them may wait on I/O or sleep.
//!
//! # Composition
//!
//! | Type                   | Description                                            |
//! |------------------------|--------------------------------------------------------|
//! | [`FunctionalBehavior`] | Lifecycle hooks supplied as closures.                  |
//! | [`InstantBehavior`]    | Runs an action once on initialize, then finishes.      |
//! | [`Timed`]              | Bounds any behavior (or [`Idle`]) to a duration.       |
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use gearbox_kernel::behavior::{Behavior, BehaviorExt, FunctionalBehavior, TickContext};
//!
//! let spin = FunctionalBehavior::new("spin")
//!     .requires("collector")
//!     .on_execute(|_ctx| Ok(()))
//!     .with_timeout(Duration::from_secs(2));
//!
//! let ctx = TickContext {
//!     now: Duration::from_secs(2),
//!     elapsed: Duration::from_secs(2),
//!     period: Duration::from_millis(20),
//! };
//! assert!(spin.is_finished(&ctx));
//! ```

use std::time::Duration;

use gearbox_types::{GearError, MechanismId};

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Where a behavior is in its lifecycle, as tracked by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorState {
    Disabled,
    Initializing,
    Running,
    Ending,
}

/// Timing passed to [`Behavior::execute`] and [`Behavior::is_finished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickContext {
    /// Scheduler clock reading for the current tick.
    pub now: Duration,
    /// Time since the behavior was admitted.
    pub elapsed: Duration,
    /// Nominal control-loop period.
    pub period: Duration,
}

/// A unit of robot action with an init/execute/end/is-finished lifecycle.
///
/// Every hook has a default, so a behavior only implements what it needs.
/// An `Err` from any hook is logged by the scheduler and the behavior is
/// ended as interrupted; it never stops other behaviors from running.
pub trait Behavior {
    /// Name used in logs and loop-timing reports.
    fn name(&self) -> &str;

    /// Mechanisms this behavior needs exclusive use of.  Read once, when the
    /// behavior is scheduled.
    fn requirements(&self) -> Vec<MechanismId> {
        Vec::new()
    }

    fn initialize(&mut self) -> Result<(), GearError> {
        Ok(())
    }

    fn execute(&mut self, _ctx: &TickContext) -> Result<(), GearError> {
        Ok(())
    }

    /// `interrupted` is `true` when the behavior was evicted, cancelled, or
    /// faulted, `false` when it finished on its own.
    fn end(&mut self, _interrupted: bool) -> Result<(), GearError> {
        Ok(())
    }

    /// Completion predicate, evaluated right after `execute`.  Must be free
    /// of side effects.
    fn is_finished(&self, _ctx: &TickContext) -> bool {
        false
    }
}

impl<B: Behavior + ?Sized> Behavior for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn requirements(&self) -> Vec<MechanismId> {
        (**self).requirements()
    }

    fn initialize(&mut self) -> Result<(), GearError> {
        (**self).initialize()
    }

    fn execute(&mut self, ctx: &TickContext) -> Result<(), GearError> {
        (**self).execute(ctx)
    }

    fn end(&mut self, interrupted: bool) -> Result<(), GearError> {
        (**self).end(interrupted)
    }

    fn is_finished(&self, ctx: &TickContext) -> bool {
        (**self).is_finished(ctx)
    }
}

/// Combinators available on every [`Behavior`].
pub trait BehaviorExt: Behavior + Sized {
    /// Finish after `duration` of scheduled time, or earlier if `self`
    /// finishes first.
    fn with_timeout(self, duration: Duration) -> Timed<Self> {
        Timed::new(self, duration)
    }

    /// Box the behavior for [`Scheduler::schedule`][crate::scheduler::Scheduler::schedule].
    fn boxed(self) -> Box<dyn Behavior>
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<B: Behavior> BehaviorExt for B {}

// ─────────────────────────────────────────────────────────────────────────────
// Idle / Timed
// ─────────────────────────────────────────────────────────────────────────────

/// A behavior that does nothing and never finishes on its own.  Useful as
/// the body of a [`Timed`] wait, or to hold a mechanism idle.
#[derive(Debug, Clone)]
pub struct Idle {
    name: String,
    requirements: Vec<MechanismId>,
}

impl Idle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirements: Vec::new(),
        }
    }

    pub fn requires(mut self, id: impl Into<MechanismId>) -> Self {
        self.requirements.push(id.into());
        self
    }
}

impl Behavior for Idle {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> Vec<MechanismId> {
        self.requirements.clone()
    }
}

/// Duration-bounded decorator.
///
/// Finished once `elapsed >= duration` – a pure function of the scheduled
/// time – or as soon as the wrapped behavior reports finished.
#[derive(Debug, Clone)]
pub struct Timed<B> {
    inner: B,
    duration: Duration,
}

impl<B: Behavior> Timed<B> {
    pub fn new(inner: B, duration: Duration) -> Self {
        Self { inner, duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl Timed<Idle> {
    /// A timed wait that requires nothing.
    pub fn idle(name: impl Into<String>, duration: Duration) -> Self {
        Self::new(Idle::new(name), duration)
    }
}

impl<B: Behavior> Behavior for Timed<B> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn requirements(&self) -> Vec<MechanismId> {
        self.inner.requirements()
    }

    fn initialize(&mut self) -> Result<(), GearError> {
        self.inner.initialize()
    }

    fn execute(&mut self, ctx: &TickContext) -> Result<(), GearError> {
        self.inner.execute(ctx)
    }

    fn end(&mut self, interrupted: bool) -> Result<(), GearError> {
        self.inner.end(interrupted)
    }

    fn is_finished(&self, ctx: &TickContext) -> bool {
        ctx.elapsed >= self.duration || self.inner.is_finished(ctx)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// InstantBehavior
// ─────────────────────────────────────────────────────────────────────────────

type Action = Box<dyn FnMut() -> Result<(), GearError>>;

/// Runs `action` once in `initialize` and reports finished on the first tick.
pub struct InstantBehavior {
    name: String,
    requirements: Vec<MechanismId>,
    action: Action,
}

impl InstantBehavior {
    pub fn new(
        name: impl Into<String>,
        action: impl FnMut() -> Result<(), GearError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            requirements: Vec::new(),
            action: Box::new(action),
        }
    }

    pub fn requires(mut self, id: impl Into<MechanismId>) -> Self {
        self.requirements.push(id.into());
        self
    }
}

impl Behavior for InstantBehavior {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> Vec<MechanismId> {
        self.requirements.clone()
    }

    fn initialize(&mut self) -> Result<(), GearError> {
        (self.action)()
    }

    fn is_finished(&self, _ctx: &TickContext) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FunctionalBehavior
// ─────────────────────────────────────────────────────────────────────────────

type ExecuteFn = Box<dyn FnMut(&TickContext) -> Result<(), GearError>>;
type EndFn = Box<dyn FnMut(bool) -> Result<(), GearError>>;
type FinishedFn = Box<dyn Fn(&TickContext) -> bool>;

/// A behavior assembled from closures.  Unset hooks fall back to the trait
/// defaults; without [`finished_when`][Self::finished_when] it runs until
/// interrupted.
pub struct FunctionalBehavior {
    name: String,
    requirements: Vec<MechanismId>,
    on_initialize: Option<Action>,
    on_execute: Option<ExecuteFn>,
    on_end: Option<EndFn>,
    finished_when: Option<FinishedFn>,
}

impl FunctionalBehavior {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirements: Vec::new(),
            on_initialize: None,
            on_execute: None,
            on_end: None,
            finished_when: None,
        }
    }

    pub fn requires(mut self, id: impl Into<MechanismId>) -> Self {
        self.requirements.push(id.into());
        self
    }

    pub fn on_initialize(mut self, f: impl FnMut() -> Result<(), GearError> + 'static) -> Self {
        self.on_initialize = Some(Box::new(f));
        self
    }

    pub fn on_execute(
        mut self,
        f: impl FnMut(&TickContext) -> Result<(), GearError> + 'static,
    ) -> Self {
        self.on_execute = Some(Box::new(f));
        self
    }

    pub fn on_end(mut self, f: impl FnMut(bool) -> Result<(), GearError> + 'static) -> Self {
        self.on_end = Some(Box::new(f));
        self
    }

    pub fn finished_when(mut self, f: impl Fn(&TickContext) -> bool + 'static) -> Self {
        self.finished_when = Some(Box::new(f));
        self
    }
}

impl Behavior for FunctionalBehavior {
    fn name(&self) -> &str {
        &self.name
    }

    fn requirements(&self) -> Vec<MechanismId> {
        self.requirements.clone()
    }

    fn initialize(&mut self) -> Result<(), GearError> {
        match self.on_initialize.as_mut() {
            Some(f) => f(),
            None => Ok(()),
        }
    }

    fn execute(&mut self, ctx: &TickContext) -> Result<(), GearError> {
        match self.on_execute.as_mut() {
            Some(f) => f(ctx),
            None => Ok(()),
        }
    }

    fn end(&mut self, interrupted: bool) -> Result<(), GearError> {
        match self.on_end.as_mut() {
            Some(f) => f(interrupted),
            None => Ok(()),
        }
    }

    fn is_finished(&self, ctx: &TickContext) -> bool {
        self.finished_when.as_ref().is_some_and(|f| f(ctx))
    }
}
