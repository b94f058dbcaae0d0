//! Biocompat Core - Biometric method registry and authentication dispatch
//!
//! This crate hides a zoo of vendor biometric back-ends behind one contract.
//! It probes the registered modules, picks candidates for a request, drives
//! them under a restart policy, normalizes vendor errors into a small failure
//! taxonomy and delivers one uniform callback sequence on a dedicated thread.

pub mod config;
pub mod context;
pub mod delivery;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod lockout;
pub mod method;
pub mod module;
pub mod modules;
pub mod policy;
pub mod prompt;
pub mod session;
pub mod settings;
pub mod taxonomy;

pub use config::{DispatchMode, DispatcherConfig};
pub use context::{BiometricContext, BiometricContextBuilder};
pub use delivery::{DeliveryQueue, DELIVERY_THREAD_NAME};
pub use dispatcher::{AuthOutcome, AuthenticationCallback, AuthenticationHandle, Dispatcher};
pub use error::{BiometricError, ModuleError, Result};
pub use host::{
    AllowAll, AlwaysFocused, DeviceInfo, DeviceInfoProvider, FocusWatch, NoDeviceInfo,
    PermissionGate, StaticDeviceInfo, UiHost,
};
pub use lockout::{
    Clock, LockoutTracker, ManualClock, PermanentLockout, SystemClock, DEFAULT_LOCKOUT_WINDOW,
};
pub use method::{AuthRequest, BiometricApi, BiometricMethod, BiometricType};
pub use module::{BiometricModule, VendorEvent, VendorEventSink};
pub use modules::{DummyModule, ScriptedModule};
pub use policy::{DefaultRestartPolicy, NeverRestart, RestartPolicy, DEFAULT_MAX_RESTARTS};
pub use prompt::{PromptInfo, PromptInfoBuilder};
pub use session::{run_session, SessionEnv, SessionOutcome};
pub use settings::{open_settings, settings_actions, SettingsAction, SettingsLauncher};
pub use taxonomy::{
    classify_platform_code, codes, AuthenticationFailureReason, AuthenticationHelpReason,
    VendorErrorKind,
};
