//! Error types for the biocompat core
//!
//! Vendor failures are never reported through these types: they are
//! classified into [`AuthenticationFailureReason`](crate::AuthenticationFailureReason)
//! at the session boundary. These errors cover configuration, persistence and
//! misuse of the context itself.

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, BiometricError>;

/// Errors that can occur in the core library
#[derive(Debug, Error)]
pub enum BiometricError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A module was registered twice for the same method
    #[error("Module already registered for method: {0}")]
    DuplicateModule(String),

    /// A name did not match any known value
    #[error("Unknown {kind}: {name}")]
    UnknownName { kind: &'static str, name: String },

    /// Initialization has not finished
    #[error("Biometric context is not initialized")]
    NotInitialized,

    /// The delivery thread is gone
    #[error("Callback delivery thread has shut down")]
    DeliveryClosed,

    /// Failed to spawn a worker thread
    #[error("Failed to spawn thread: {0}")]
    Spawn(String),
}

impl From<serde_json::Error> for BiometricError {
    fn from(e: serde_json::Error) -> Self {
        BiometricError::Serialization(e.to_string())
    }
}

/// Errors a module may return when it cannot start a vendor session
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The vendor API handle could not be obtained
    #[error("Vendor manager is not accessible")]
    ManagerUnavailable,

    /// The vendor call itself failed
    #[error("Vendor call failed: {0}")]
    VendorCall(String),
}
