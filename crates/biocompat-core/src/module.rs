//! Back-end module contract
//!
//! A module adapts one vendor or platform biometric API. It only knows how to
//! probe the sensor and how to start and abort one vendor session; retries,
//! lockouts and result delivery are handled by the session driver.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ModuleError;
use crate::method::{BiometricMethod, BiometricType};
use crate::taxonomy::{classify_platform_code, VendorErrorKind};

/// Raw callback from a vendor session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorEvent {
    /// The vendor accepted the biometric
    Succeeded,
    /// A biometric was read but did not match
    NoMatch,
    /// Non-terminal acquisition hint
    Help { code: i32, message: String },
    /// The vendor session ended with an error code
    Error { code: i32, message: String },
}

impl VendorEvent {
    pub fn error(code: i32) -> Self {
        VendorEvent::Error {
            code,
            message: String::new(),
        }
    }

    pub fn help(code: i32) -> Self {
        VendorEvent::Help {
            code,
            message: String::new(),
        }
    }
}

/// Where a module delivers its vendor callbacks
///
/// Sending never blocks; events sent after the session driver stopped
/// listening are dropped.
#[derive(Debug, Clone)]
pub struct VendorEventSink {
    tx: mpsc::UnboundedSender<VendorEvent>,
}

impl VendorEventSink {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<VendorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Deliver one event; returns `false` once nobody is listening
    pub fn send(&self, event: VendorEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Whether the session driver stopped listening
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One authentication back-end
#[async_trait]
pub trait BiometricModule: Send + Sync {
    /// The registry entry this module implements
    fn method(&self) -> BiometricMethod;

    /// Whether the vendor API handle was obtained at construction
    ///
    /// Must not change from `false` to `true` over the module's lifetime.
    fn is_manager_accessible(&self) -> bool;

    /// Whether the sensor is present; `false` on any internal failure
    async fn is_hardware_present(&self) -> bool;

    /// Whether biometrics are enrolled; `false` on any internal failure
    async fn has_enrolled(&self) -> bool;

    /// Live vendor lockout query, for vendors that expose one
    async fn is_vendor_locked_out(&self) -> bool {
        false
    }

    /// Permissions the host must grant before a session
    fn required_permissions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Map a vendor error code onto the taxonomy
    ///
    /// Must be total: every code yields a kind.
    fn classify(&self, code: i32) -> VendorErrorKind {
        classify_platform_code(code)
    }

    /// Start one vendor session
    ///
    /// Returns once the session is started; results arrive through `sink`.
    /// The module should stop the session when `token` is cancelled.
    async fn authenticate(
        &self,
        token: CancellationToken,
        sink: VendorEventSink,
    ) -> std::result::Result<(), ModuleError>;

    /// Abort the outstanding vendor session, if any
    async fn cancel(&self);

    /// Sensor category of this module
    fn biometric_type(&self) -> BiometricType {
        self.method().biometric_type()
    }

    /// Display name for logs
    fn name(&self) -> &'static str {
        self.method().name()
    }
}
