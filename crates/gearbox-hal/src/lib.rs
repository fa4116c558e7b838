//! `gearbox-hal` – Hardware Abstraction
//!
//! Everything that touches a motor controller or the dashboard goes through
//! the traits in this crate, so mechanisms can run against real drivers, the
//! in-process simulator, or a test double without change.
//!
//! # Modules
//!
//! - [`channel`] – [`HardwareChannel`][channel::HardwareChannel]: one motor
//!   controller axis (open-loop output, gain parameters, closed-loop
//!   reference, bus voltage and output current).
//! - [`closed_loop`] – [`ClosedLoopActuator`][closed_loop::ClosedLoopActuator]:
//!   wraps a channel's native PID with validated, write-through gain setters
//!   and live tuning against the telemetry store.
//! - [`telemetry_store`] – [`TelemetryStore`][telemetry_store::TelemetryStore]
//!   and the in-memory [`MemoryTelemetryStore`][telemetry_store::MemoryTelemetryStore].
//! - [`pid`] – [`PidController`][pid::PidController]: software model of the
//!   controller's on-board loop, used by the simulator.
//! - [`sim`] – [`SimChannel`][sim::SimChannel] and [`SimProbe`][sim::SimProbe]
//!   for headless tests and the simulated robot.

pub mod channel;
pub mod closed_loop;
pub mod pid;
pub mod sim;
pub mod telemetry_store;

pub use channel::HardwareChannel;
pub use closed_loop::ClosedLoopActuator;
pub use pid::PidController;
pub use sim::{SimChannel, SimProbe};
pub use telemetry_store::{MemoryTelemetryStore, TelemetryStore};
