//! Robot configuration – reads/writes `~/.gearbox/config.toml`.
//!
//! Every field has a default, so an absent file or a file that sets only a
//! few keys is valid.
//!
//! ```toml
//! period_ms = 20
//! autonomous_seconds = 3.0
//!
//! [collector]
//! channel = 5
//! engaged_output = 0.65
//!
//! [climber]
//! channel = 6
//! hold_angle = 12.5
//! live_tuning = true
//!
//! [climber.gains]
//! p = 0.4
//! max_output = 0.8
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gearbox_types::{Gains, GearError};
use serde::{Deserialize, Serialize};

use crate::collector::DEFAULT_ENGAGED_OUTPUT;

/// Top-level robot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    /// Control-loop period in milliseconds.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    /// Length of the autonomous routine in seconds.
    #[serde(default = "default_autonomous_seconds")]
    pub autonomous_seconds: f64,

    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub climber: ClimberConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_collector_channel")]
    pub channel: u32,

    #[serde(default = "default_collector_name")]
    pub name: String,

    /// Output fraction while engaged, in `[0, 1]`.
    #[serde(default = "default_engaged_output")]
    pub engaged_output: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimberConfig {
    #[serde(default = "default_climber_channel")]
    pub channel: u32,

    #[serde(default = "default_climber_name")]
    pub name: String,

    /// Position reference, in rotations, commanded by `set_held(true)`.
    #[serde(default)]
    pub hold_angle: f64,

    #[serde(default)]
    pub gains: Gains,

    /// Re-read gains from the dashboard every tick.
    #[serde(default)]
    pub live_tuning: bool,
}

fn default_period_ms() -> u64 {
    20
}
fn default_autonomous_seconds() -> f64 {
    3.0
}
fn default_collector_channel() -> u32 {
    5
}
fn default_collector_name() -> String {
    "collector".to_string()
}
fn default_engaged_output() -> f64 {
    DEFAULT_ENGAGED_OUTPUT
}
fn default_climber_channel() -> u32 {
    6
}
fn default_climber_name() -> String {
    "climber".to_string()
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            autonomous_seconds: default_autonomous_seconds(),
            collector: CollectorConfig::default(),
            climber: ClimberConfig::default(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            channel: default_collector_channel(),
            name: default_collector_name(),
            engaged_output: default_engaged_output(),
        }
    }
}

impl Default for ClimberConfig {
    fn default() -> Self {
        Self {
            channel: default_climber_channel(),
            name: default_climber_name(),
            hold_angle: 0.0,
            gains: Gains::default(),
            live_tuning: false,
        }
    }
}

impl RobotConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn autonomous_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.autonomous_seconds.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Check the values that would otherwise only fail once hardware is
    /// being commanded.
    ///
    /// # Errors
    ///
    /// [`GearError::InvalidRange`] naming the offending section.
    pub fn validate(&self) -> Result<(), GearError> {
        if self.period_ms == 0 {
            return Err(invalid("period_ms", "loop period must be at least 1 ms"));
        }
        let seconds = self.autonomous_seconds;
        if seconds < 0.0 || Duration::try_from_secs_f64(seconds).is_err() {
            return Err(invalid(
                "autonomous_seconds",
                &format!("{seconds} is not a representable non-negative duration"),
            ));
        }
        if !(0.0..=1.0).contains(&self.collector.engaged_output) {
            return Err(invalid(
                &self.collector.name,
                &format!("engaged output {} is outside [0, 1]", self.collector.engaged_output),
            ));
        }
        if self.collector.name == self.climber.name {
            return Err(invalid(
                &self.climber.name,
                "collector and climber must have distinct names",
            ));
        }
        if !self.climber.hold_angle.is_finite() {
            return Err(invalid(&self.climber.name, "hold angle is not finite"));
        }
        self.climber.gains.validate(&self.climber.name)
    }
}

fn invalid(component: &str, details: &str) -> GearError {
    GearError::InvalidRange {
        component: component.to_string(),
        details: details.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Load / save
// ─────────────────────────────────────────────────────────────────────────────

/// `$GEARBOX_CONFIG` if set, otherwise `~/.gearbox/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("GEARBOX_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".gearbox").join("config.toml")
}

/// Load the configuration from [`config_path`], falling back to defaults
/// when the file does not exist.  Environment overrides are applied either
/// way.
///
/// # Errors
///
/// [`GearError::Config`] if the file exists but cannot be read or parsed.
pub fn load() -> Result<RobotConfig, GearError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Parse the file at `path`.  Returns `None` if it does not exist.
pub fn load_from(path: &Path) -> Result<Option<RobotConfig>, GearError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        GearError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| GearError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Write `cfg` to `path`, creating parent directories.
pub fn save_to(cfg: &RobotConfig, path: &Path) -> Result<(), GearError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| GearError::Config(format!("failed to create config directory: {e}")))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| GearError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        GearError::Config(format!("failed to write config at {}: {e}", path.display()))
    })
}

/// Apply `GEARBOX_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `GEARBOX_PERIOD_MS` | `period_ms` |
/// | `GEARBOX_AUTO_SECONDS` | `autonomous_seconds` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut RobotConfig) {
    if let Ok(v) = std::env::var("GEARBOX_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.period_ms = ms;
    }
    if let Ok(v) = std::env::var("GEARBOX_AUTO_SECONDS")
        && let Ok(secs) = v.parse::<f64>()
    {
        cfg.autonomous_seconds = secs;
    }
}
