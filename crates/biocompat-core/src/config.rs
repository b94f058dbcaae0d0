//! Dispatcher configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BiometricError, Result};
use crate::lockout::DEFAULT_LOCKOUT_WINDOW;
use crate::policy::DEFAULT_MAX_RESTARTS;

/// How candidates of one request are driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One candidate at a time, falling through on failure
    #[default]
    Sequential,
    /// All candidates at once; the first success cancels the rest
    Concurrent,
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Cool-down after a lockout (seconds)
    pub lockout_window_secs: u64,

    /// Silent restarts for transient failures
    pub max_restarts: u32,

    /// Candidate scheduling
    pub dispatch_mode: DispatchMode,

    /// Upper bound on waiting for device metadata during init (seconds)
    pub init_timeout_secs: u64,

    /// Where lockout records are persisted, if anywhere
    pub lockout_store_path: Option<PathBuf>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            lockout_window_secs: DEFAULT_LOCKOUT_WINDOW.as_secs(),
            max_restarts: DEFAULT_MAX_RESTARTS,
            dispatch_mode: DispatchMode::Sequential,
            init_timeout_secs: 10,
            lockout_store_path: None,
        }
    }
}

impl DispatcherConfig {
    pub fn lockout_window(&self) -> Duration {
        Duration::from_secs(self.lockout_window_secs)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    /// Reject values the dispatcher cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.lockout_window_secs == 0 {
            return Err(BiometricError::Config(
                "lockout_window_secs must be greater than zero".to_string(),
            ));
        }
        if self.init_timeout_secs == 0 {
            return Err(BiometricError::Config(
                "init_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
