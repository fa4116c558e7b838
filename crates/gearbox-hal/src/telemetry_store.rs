//! Key/value telemetry store shared with the driver-station dashboard.
//!
//! Components receive the store as an injected `Arc<dyn TelemetryStore>` and
//! use it both to publish health metrics and to read live-tuning values.
//! Keys are free-form, human-readable strings scoped by component name
//! (e.g. `"climber P Gain"`).  There is no schema; the last write wins.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use gearbox_types::TelemetryValue;

/// The dashboard capability consumed by actuators and mechanisms.
///
/// Reads take a default that is returned when the key is absent or holds a
/// value of the other kind.
pub trait TelemetryStore: Send + Sync {
    fn get_number(&self, key: &str, default: f64) -> f64;

    fn put_number(&self, key: &str, value: f64);

    fn get_boolean(&self, key: &str, default: bool) -> bool;

    fn put_boolean(&self, key: &str, value: bool);

    /// Every key currently held, sorted by key.
    fn snapshot(&self) -> BTreeMap<String, TelemetryValue>;
}

/// In-process [`TelemetryStore`] backed by a `RwLock<HashMap>`.
///
/// Safe to share between the control thread and a dashboard reader thread.
///
/// # Example
///
/// ```rust
/// use gearbox_hal::telemetry_store::{MemoryTelemetryStore, TelemetryStore};
///
/// let store = MemoryTelemetryStore::new();
/// store.put_number("climber P Gain", 0.4);
/// assert_eq!(store.get_number("climber P Gain", 0.0), 0.4);
/// assert_eq!(store.get_number("missing", 1.5), 1.5);
/// ```
#[derive(Debug, Default)]
pub struct MemoryTelemetryStore {
    values: RwLock<HashMap<String, TelemetryValue>>,
}

impl MemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Option<TelemetryValue> {
        // A poisoned lock still holds consistent map data; every write is a
        // single insert.
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(key).copied()
    }

    fn put(&self, key: &str, value: TelemetryValue) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
    }
}

impl TelemetryStore for MemoryTelemetryStore {
    fn get_number(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            Some(TelemetryValue::Number(v)) => v,
            _ => default,
        }
    }

    fn put_number(&self, key: &str, value: f64) {
        self.put(key, TelemetryValue::Number(value));
    }

    fn get_boolean(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(TelemetryValue::Boolean(v)) => v,
            _ => default,
        }
    }

    fn put_boolean(&self, key: &str, value: bool) {
        self.put(key, TelemetryValue::Boolean(value));
    }

    fn snapshot(&self) -> BTreeMap<String, TelemetryValue> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}
