//! `gearbox-kernel` – Cooperative Scheduling
//!
//! The control-loop core of Gearbox.  It never touches hardware itself; it
//! decides which behavior may command which mechanism, and when.
//!
//! # Modules
//!
//! - [`mechanism`] – [`Mechanism`][mechanism::Mechanism]: a hardware module
//!   with an identity and a per-tick `periodic` hook, shared between the
//!   scheduler and behaviors as an `Rc<RefCell<_>>`.
//! - [`behavior`] – [`Behavior`][behavior::Behavior] and its lifecycle, plus
//!   the [`FunctionalBehavior`][behavior::FunctionalBehavior],
//!   [`InstantBehavior`][behavior::InstantBehavior] and
//!   [`Timed`][behavior::Timed] building blocks.
//! - [`scheduler`] – [`Scheduler`][scheduler::Scheduler]: admits behaviors,
//!   arbitrates exclusive mechanism ownership, and runs one tick per period.
//! - [`clock`] – [`Clock`][clock::Clock] with a monotonic and a manual
//!   implementation.
//! - [`watchdog`] – [`LoopWatchdog`][watchdog::LoopWatchdog]: flags ticks that
//!   overrun the loop period and names the slowest step.
//!
//! Everything in this crate is single-threaded.  A [`Scheduler`] is `!Send`
//! and lives on the control thread that calls [`Scheduler::tick`].

pub mod behavior;
pub mod clock;
pub mod mechanism;
pub mod scheduler;
pub mod watchdog;

pub use behavior::{
    Behavior, BehaviorExt, BehaviorState, FunctionalBehavior, Idle, InstantBehavior, TickContext,
    Timed,
};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use mechanism::{Mechanism, SharedMechanism, shared};
pub use scheduler::{BehaviorHandle, DEFAULT_PERIOD, Scheduler};
pub use watchdog::{LoopHealth, LoopWatchdog};
