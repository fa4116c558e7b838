//! `gearbox-runtime` – The Robot
//!
//! Concrete mechanisms, their stock behaviors, and the fixed-period loop
//! that drives them.
//!
//! # Modules
//!
//! - [`collector`] – [`Collector`][collector::Collector]: open-loop spinner
//!   with an engaged/disengaged state.
//! - [`climber`] – [`Climber`][climber::Climber]: position-held arm on a
//!   [`ClosedLoopActuator`][gearbox_hal::ClosedLoopActuator], with optional
//!   live gain tuning from the dashboard.
//! - [`autonomous`] – the timed autonomous routine and the collector/climber
//!   behaviors it is built from.
//! - [`config`] – [`RobotConfig`][config::RobotConfig], loaded from
//!   `~/.gearbox/config.toml` with `GEARBOX_*` environment overrides.
//! - [`robot`] – [`RobotLoop`][robot::RobotLoop]: builds the simulated
//!   robot and paces scheduler ticks.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: log
//!   formatting and optional OTLP span export.

pub mod autonomous;
pub mod climber;
pub mod collector;
pub mod config;
pub mod robot;
pub mod telemetry;

pub use climber::Climber;
pub use collector::Collector;
pub use config::RobotConfig;
pub use robot::RobotLoop;
pub use telemetry::{TracerProviderGuard, init_tracing};
