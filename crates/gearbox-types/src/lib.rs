use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identity of a mechanism registered with the scheduler (e.g.
/// `"collector"`, `"climber"`).
///
/// Ownership arbitration and periodic registration are both keyed on this
/// value, so two handles with the same id are treated as the same mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MechanismId(String);

impl MechanismId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MechanismId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MechanismId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MechanismId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One of the seven closed-loop tuning parameters held by a hardware PID
/// channel, listed in tuple order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GainParam {
    P,
    I,
    D,
    IZone,
    FeedForward,
    MinOutput,
    MaxOutput,
}

impl GainParam {
    /// Every parameter, in the order a full gain write is issued.
    pub const ALL: [GainParam; 7] = [
        GainParam::P,
        GainParam::I,
        GainParam::D,
        GainParam::IZone,
        GainParam::FeedForward,
        GainParam::MinOutput,
        GainParam::MaxOutput,
    ];

    /// Dashboard label suffix; the full telemetry key is `"<name> <label>"`.
    pub fn label(self) -> &'static str {
        match self {
            GainParam::P => "P Gain",
            GainParam::I => "I Gain",
            GainParam::D => "D Gain",
            GainParam::IZone => "I Zone",
            GainParam::FeedForward => "Feed Forward",
            GainParam::MinOutput => "Min Output",
            GainParam::MaxOutput => "Max Output",
        }
    }
}

/// Closed-loop gain tuple `{P, I, D, I-zone, feed-forward, min, max}`.
///
/// A tuple is only accepted by an actuator once [`Gains::validate`] passes:
/// `min_output <= max_output`, `i_zone >= 0`, and every field finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gains {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub i_zone: f64,
    pub ff: f64,
    pub min_output: f64,
    pub max_output: f64,
}

impl Default for Gains {
    fn default() -> Self {
        Self {
            p: 0.1,
            i: 1e-4,
            d: 1.0,
            i_zone: 0.0,
            ff: 0.0,
            min_output: -1.0,
            max_output: 1.0,
        }
    }
}

impl Gains {
    /// PID gains with no I-zone, no feed-forward and a full `[-1, 1]` output
    /// range.
    pub fn pid(p: f64, i: f64, d: f64) -> Self {
        Self {
            p,
            i,
            d,
            i_zone: 0.0,
            ff: 0.0,
            min_output: -1.0,
            max_output: 1.0,
        }
    }

    pub fn with_i_zone(mut self, i_zone: f64) -> Self {
        self.i_zone = i_zone;
        self
    }

    pub fn with_ff(mut self, ff: f64) -> Self {
        self.ff = ff;
        self
    }

    pub fn with_output_range(mut self, min: f64, max: f64) -> Self {
        self.min_output = min;
        self.max_output = max;
        self
    }

    pub fn get(&self, param: GainParam) -> f64 {
        match param {
            GainParam::P => self.p,
            GainParam::I => self.i,
            GainParam::D => self.d,
            GainParam::IZone => self.i_zone,
            GainParam::FeedForward => self.ff,
            GainParam::MinOutput => self.min_output,
            GainParam::MaxOutput => self.max_output,
        }
    }

    pub fn set(&mut self, param: GainParam, value: f64) {
        match param {
            GainParam::P => self.p = value,
            GainParam::I => self.i = value,
            GainParam::D => self.d = value,
            GainParam::IZone => self.i_zone = value,
            GainParam::FeedForward => self.ff = value,
            GainParam::MinOutput => self.min_output = value,
            GainParam::MaxOutput => self.max_output = value,
        }
    }

    /// Check the tuple invariants.
    ///
    /// # Errors
    ///
    /// Returns [`GearError::InvalidRange`] naming `component` when any field
    /// is non-finite, `i_zone` is negative, or `min_output > max_output`.
    pub fn validate(&self, component: &str) -> Result<(), GearError> {
        if let Some(param) = GainParam::ALL.iter().find(|p| !self.get(**p).is_finite()) {
            return Err(GearError::InvalidRange {
                component: component.to_string(),
                details: format!("{} is not finite", param.label()),
            });
        }
        if self.i_zone < 0.0 {
            return Err(GearError::InvalidRange {
                component: component.to_string(),
                details: format!("I Zone {} is negative", self.i_zone),
            });
        }
        if self.min_output > self.max_output {
            return Err(GearError::InvalidRange {
                component: component.to_string(),
                details: format!(
                    "min output {} exceeds max output {}",
                    self.min_output, self.max_output
                ),
            });
        }
        Ok(())
    }
}

/// A closed-loop set-point: the control mode plus its scalar target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value")]
pub enum ClosedLoopTarget {
    /// Target position, in motor rotations.
    Position(f64),
    /// Target velocity, in the channel's configured units per second.
    Velocity(f64),
}

impl ClosedLoopTarget {
    pub fn value(&self) -> f64 {
        match *self {
            ClosedLoopTarget::Position(v) | ClosedLoopTarget::Velocity(v) => v,
        }
    }
}

/// A value held by the telemetry store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Number(f64),
    Boolean(bool),
}

/// Error type shared by the HAL, the scheduler and the runtime.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GearError {
    #[error("Invalid range on {component}: {details}")]
    InvalidRange { component: String, details: String },

    #[error("Hardware write failed on channel {channel}: {details}")]
    HardwareWrite { channel: u32, details: String },

    #[error("Hardware read failed on channel {channel}: {details}")]
    HardwareRead { channel: u32, details: String },

    #[error("Behavior '{behavior}' faulted: {details}")]
    BehaviorFault { behavior: String, details: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
