//! Leak accounting for streams and strong subscriptions
//!
//! Every tracked allocation bumps a counter keyed by the source location that
//! created it; disposal brings it back down. A harness resets the registry
//! before a unit of work and validates it afterwards: any key left above zero
//! points at the code path that leaked.
//!
//! Counting is compiled down to a flag check when debug assertions are off.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{LeakError, LeakResult};

/// Identifier of the call site that created a tracked object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackingKey(String);

impl TrackingKey {
    /// Key for the caller of the current `#[track_caller]` chain
    #[track_caller]
    pub fn here(kind: &str) -> Self {
        Self::from_location(kind, Location::caller())
    }

    pub fn from_location(kind: &str, location: &Location<'_>) -> Self {
        TrackingKey(format!(
            "{}@{}:{}:{}",
            kind,
            location.file(),
            location.line(),
            location.column()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One key together with its current count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakEntry {
    pub key: String,
    pub count: i64,
}

/// Result of validating a registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakReport {
    /// Keys with a positive count, sorted by key
    pub outstanding: Vec<LeakEntry>,
    /// Keys with a negative count, sorted by key
    pub over_released: Vec<LeakEntry>,
}

impl LeakReport {
    /// True when nothing is outstanding
    pub fn is_clean(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// True when every count is exactly zero
    pub fn is_balanced(&self) -> bool {
        self.outstanding.is_empty() && self.over_released.is_empty()
    }

    /// Total number of outstanding allocations across all keys
    pub fn outstanding_total(&self) -> i64 {
        self.outstanding.iter().map(|e| e.count).sum()
    }

    /// Fails only on outstanding allocations
    pub fn into_result(self) -> LeakResult<()> {
        if self.outstanding.is_empty() {
            Ok(())
        } else {
            Err(LeakError::Outstanding {
                entries: self.outstanding,
            })
        }
    }

    /// Fails on outstanding allocations and on over-released keys
    pub fn into_strict_result(self) -> LeakResult<()> {
        if !self.outstanding.is_empty() {
            return Err(LeakError::Outstanding {
                entries: self.outstanding,
            });
        }
        if !self.over_released.is_empty() {
            return Err(LeakError::OverReleased {
                entries: self.over_released,
            });
        }
        Ok(())
    }

    /// JSON rendering for harness logs
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Process-wide counter of live streams and strong subscriptions
#[derive(Clone)]
pub struct LeakRegistry {
    enabled: bool,
    counts: Arc<Mutex<HashMap<String, i64>>>,
}

impl Default for LeakRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LeakRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeakRegistry")
            .field("enabled", &self.enabled)
            .field("keys", &self.lock().len())
            .finish()
    }
}

impl LeakRegistry {
    /// Registry that counts only in debug builds
    pub fn new() -> Self {
        Self::with_enabled(cfg!(debug_assertions))
    }

    /// Registry that always counts, regardless of build profile
    pub fn enabled() -> Self {
        Self::with_enabled(true)
    }

    /// Registry where every operation is a no-op
    pub fn disabled() -> Self {
        Self::with_enabled(false)
    }

    fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled,
            counts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether two handles point at the same counters
    pub fn same_registry(&self, other: &LeakRegistry) -> bool {
        Arc::ptr_eq(&self.counts, &other.counts)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn increment(&self, key: &TrackingKey) {
        if !self.enabled {
            return;
        }
        let mut counts = self.lock();
        *counts.entry(key.as_str().to_owned()).or_insert(0) += 1;
    }

    pub fn decrement(&self, key: &TrackingKey) {
        if !self.enabled {
            return;
        }
        let mut counts = self.lock();
        let count = counts.entry(key.as_str().to_owned()).or_insert(0);
        *count -= 1;
        if *count == 0 {
            counts.remove(key.as_str());
        }
    }

    /// Current count for a key, zero when unknown
    pub fn count(&self, key: &TrackingKey) -> i64 {
        self.lock().get(key.as_str()).copied().unwrap_or(0)
    }

    /// Sum of all positive counts
    pub fn outstanding(&self) -> i64 {
        self.lock().values().filter(|c| **c > 0).sum()
    }

    /// Zero every count
    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Snapshot the counters into a report
    pub fn validate(&self) -> LeakReport {
        let counts = self.lock();
        let mut report = LeakReport::default();
        for (key, &count) in counts.iter() {
            let entry = LeakEntry {
                key: key.clone(),
                count,
            };
            if count > 0 {
                report.outstanding.push(entry);
            } else if count < 0 {
                report.over_released.push(entry);
            }
        }
        drop(counts);

        report.outstanding.sort_by(|a, b| a.key.cmp(&b.key));
        report.over_released.sort_by(|a, b| a.key.cmp(&b.key));

        for entry in &report.over_released {
            log::warn!(
                "Leak registry key {} released {} more time(s) than allocated",
                entry.key,
                -entry.count
            );
        }
        report
    }
}

/// One counted allocation, released at most once
pub(crate) struct Allocation {
    registry: LeakRegistry,
    key: TrackingKey,
}

impl Allocation {
    /// Counts `key` in `registry`; nothing is recorded when it is disabled
    pub(crate) fn record(registry: LeakRegistry, key: TrackingKey) -> Option<Self> {
        if !registry.is_enabled() {
            return None;
        }
        registry.increment(&key);
        Some(Allocation { registry, key })
    }

    pub(crate) fn release(self) {
        self.registry.decrement(&self.key);
    }
}

lazy_static::lazy_static! {
    /// Registry used by streams whose configuration does not inject one
    pub static ref GLOBAL_LEAK_REGISTRY: LeakRegistry = LeakRegistry::new();
}

/// Get the global leak registry
pub fn get_global_leak_registry() -> LeakRegistry {
    GLOBAL_LEAK_REGISTRY.clone()
}
