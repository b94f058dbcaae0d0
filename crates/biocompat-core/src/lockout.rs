//! Cool-down tracking for locked out back-ends
//!
//! A lockout is recorded as a wall-clock timestamp per method. Expiry is
//! computed when the record is read; a read that finds an expired record
//! removes it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::method::{BiometricMethod, BiometricType};

/// Default cool-down window (31 seconds)
pub const DEFAULT_LOCKOUT_WINDOW: Duration = Duration::from_secs(31);

/// Source of wall-clock time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// On-disk form of the lockout records
#[derive(Debug, Default, Serialize, Deserialize)]
struct LockoutSnapshot {
    /// Method name -> last lockout time
    entries: BTreeMap<String, DateTime<Utc>>,
}

/// Per-method lockout timestamps with lazy expiry
pub struct LockoutTracker {
    window: Duration,
    clock: Arc<dyn Clock>,
    records: Mutex<HashMap<BiometricMethod, DateTime<Utc>>>,
}

impl fmt::Debug for LockoutTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockoutTracker")
            .field("window", &self.window)
            .field("records", &*self.records.lock())
            .finish()
    }
}

impl Default for LockoutTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LOCKOUT_WINDOW, Arc::new(SystemClock))
    }
}

impl LockoutTracker {
    /// Create a tracker with the given cool-down window
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// The cool-down window
    pub fn window(&self) -> Duration {
        self.window
    }

    fn still_active(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        // A timestamp in the future (clock moved backwards) counts as active
        now.signed_duration_since(since)
            .to_std()
            .map(|elapsed| elapsed < self.window)
            .unwrap_or(true)
    }

    /// Record a lockout for `method`
    ///
    /// Returns `false` when the method was already locked out, in which case
    /// the earlier timestamp is kept.
    pub fn lockout(&self, method: BiometricMethod) -> bool {
        let now = self.clock.now();
        let mut records = self.records.lock();

        if let Some(&since) = records.get(&method) {
            if self.still_active(since, now) {
                return false;
            }
        }

        debug!("Lockout recorded for {}", method);
        records.insert(method, now);
        true
    }

    /// Whether `method` is inside its cool-down window
    ///
    /// An expired record is cleared by this call.
    pub fn is_locked_out(&self, method: BiometricMethod) -> bool {
        let now = self.clock.now();
        let mut records = self.records.lock();

        match records.get(&method) {
            Some(&since) if self.still_active(since, now) => true,
            Some(_) => {
                debug!("Lockout expired for {}", method);
                records.remove(&method);
                false
            }
            None => false,
        }
    }

    /// Whether any method of category `kind` is locked out
    pub fn is_type_locked_out(&self, kind: BiometricType) -> bool {
        BiometricMethod::all()
            .iter()
            .filter(|m| kind.matches(m.biometric_type()))
            .any(|m| self.is_locked_out(*m))
    }

    /// Time left before `method` may be used again
    pub fn remaining(&self, method: BiometricMethod) -> Option<Duration> {
        let now = self.clock.now();
        let records = self.records.lock();
        let since = records.get(&method)?;
        let elapsed = now.signed_duration_since(*since).to_std().unwrap_or_default();
        self.window.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// Raw stored timestamp, without expiry handling
    pub fn recorded_at(&self, method: BiometricMethod) -> Option<DateTime<Utc>> {
        self.records.lock().get(&method).copied()
    }

    /// Drop the record for `method`
    pub fn clear(&self, method: BiometricMethod) {
        self.records.lock().remove(&method);
    }

    /// Load records from a JSON file, replacing the current ones
    pub fn load(&self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: LockoutSnapshot = serde_json::from_str(&content)?;

        let mut records = self.records.lock();
        records.clear();
        for (name, since) in snapshot.entries {
            match BiometricMethod::from_name(&name) {
                Some(method) => {
                    records.insert(method, since);
                }
                None => warn!("Ignoring lockout record for unknown method: {}", name),
            }
        }

        Ok(())
    }

    /// Save records to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = LockoutSnapshot {
            entries: self
                .records
                .lock()
                .iter()
                .map(|(method, since)| (method.name().to_string(), *since))
                .collect(),
        };

        let content = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Sensor categories the vendor reported as permanently locked
///
/// Cleared only when the device is unlocked with the system credential.
#[derive(Debug, Default)]
pub struct PermanentLockout {
    locked: Mutex<HashSet<BiometricType>>,
}

impl PermanentLockout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a category as permanently locked
    pub fn mark(&self, kind: BiometricType) {
        warn!("Sensor category {} permanently locked", kind);
        self.locked.lock().insert(kind);
    }

    /// Whether `kind` is permanently locked; `Any` checks every category
    pub fn is_locked(&self, kind: BiometricType) -> bool {
        let locked = self.locked.lock();
        match kind {
            BiometricType::Any => !locked.is_empty(),
            kind => locked.contains(&kind),
        }
    }

    /// Clear every mark
    pub fn reset(&self) {
        self.locked.lock().clear();
    }
}
