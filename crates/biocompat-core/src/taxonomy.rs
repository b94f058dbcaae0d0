//! Normalized authentication outcomes
//!
//! Every vendor back-end reports errors with its own numeric codes. Before a
//! result leaves a module it is mapped onto the closed
//! [`AuthenticationFailureReason`] set defined here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Standard platform biometric error and acquisition codes
pub mod codes {
    pub const ERROR_HW_UNAVAILABLE: i32 = 1;
    pub const ERROR_UNABLE_TO_PROCESS: i32 = 2;
    pub const ERROR_TIMEOUT: i32 = 3;
    pub const ERROR_NO_SPACE: i32 = 4;
    pub const ERROR_CANCELED: i32 = 5;
    pub const ERROR_LOCKOUT: i32 = 7;
    pub const ERROR_VENDOR: i32 = 8;
    pub const ERROR_LOCKOUT_PERMANENT: i32 = 9;
    pub const ERROR_USER_CANCELED: i32 = 10;
    pub const ERROR_NO_BIOMETRICS: i32 = 11;
    pub const ERROR_HW_NOT_PRESENT: i32 = 12;

    pub const ACQUIRED_GOOD: i32 = 0;
    pub const ACQUIRED_PARTIAL: i32 = 1;
    pub const ACQUIRED_INSUFFICIENT: i32 = 2;
    pub const ACQUIRED_IMAGER_DIRTY: i32 = 3;
    pub const ACQUIRED_TOO_SLOW: i32 = 4;
    pub const ACQUIRED_TOO_FAST: i32 = 5;
    pub const ACQUIRED_VENDOR: i32 = 6;
}

/// Terminal failure reasons visible to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationFailureReason {
    NoHardware,
    NoBiometricsRegistered,
    HardwareUnavailable,
    LockedOut,
    SensorFailed,
    Timeout,
    AuthenticationFailed,
    Unknown,
}

impl AuthenticationFailureReason {
    /// All members of the taxonomy
    pub const ALL: [AuthenticationFailureReason; 8] = [
        Self::NoHardware,
        Self::NoBiometricsRegistered,
        Self::HardwareUnavailable,
        Self::LockedOut,
        Self::SensorFailed,
        Self::Timeout,
        Self::AuthenticationFailed,
        Self::Unknown,
    ];

    /// Whether another attempt may succeed without user or system action
    pub fn is_transient(self) -> bool {
        matches!(self, Self::SensorFailed | Self::AuthenticationFailed)
    }

    /// Stable upper-case name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoHardware => "NO_HARDWARE",
            Self::NoBiometricsRegistered => "NO_BIOMETRICS_REGISTERED",
            Self::HardwareUnavailable => "HARDWARE_UNAVAILABLE",
            Self::LockedOut => "LOCKED_OUT",
            Self::SensorFailed => "SENSOR_FAILED",
            Self::Timeout => "TIMEOUT",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for AuthenticationFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-terminal acquisition hints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationHelpReason {
    Good,
    Partial,
    Insufficient,
    ImagerDirty,
    TooSlow,
    TooFast,
    Vendor,
    Unknown,
}

impl AuthenticationHelpReason {
    /// Map a standard acquisition code; unrecognized codes become `Unknown`
    pub fn from_code(code: i32) -> Self {
        match code {
            codes::ACQUIRED_GOOD => Self::Good,
            codes::ACQUIRED_PARTIAL => Self::Partial,
            codes::ACQUIRED_INSUFFICIENT => Self::Insufficient,
            codes::ACQUIRED_IMAGER_DIRTY => Self::ImagerDirty,
            codes::ACQUIRED_TOO_SLOW => Self::TooSlow,
            codes::ACQUIRED_TOO_FAST => Self::TooFast,
            codes::ACQUIRED_VENDOR => Self::Vendor,
            _ => Self::Unknown,
        }
    }
}

/// What a vendor error code means to the session driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorErrorKind {
    /// A plain failure with a normalized reason
    Failure(AuthenticationFailureReason),
    /// Temporary vendor lockout; recorded in the lockout tracker
    Lockout,
    /// Lockout that only the system can clear; marks the whole category
    PermanentLockout,
    /// The user dismissed the vendor UI
    UserCanceled,
    /// The vendor session was canceled
    Canceled,
}

impl VendorErrorKind {
    /// Normalized failure reason, or `None` for cancellations
    pub fn reason(self) -> Option<AuthenticationFailureReason> {
        match self {
            Self::Failure(reason) => Some(reason),
            Self::Lockout => Some(AuthenticationFailureReason::LockedOut),
            Self::PermanentLockout => Some(AuthenticationFailureReason::HardwareUnavailable),
            Self::UserCanceled | Self::Canceled => None,
        }
    }
}

/// Classify a standard platform biometric error code
///
/// Total over `i32`: codes outside the known set map to `Unknown`.
pub fn classify_platform_code(code: i32) -> VendorErrorKind {
    use AuthenticationFailureReason as R;

    match code {
        codes::ERROR_NO_BIOMETRICS => VendorErrorKind::Failure(R::NoBiometricsRegistered),
        codes::ERROR_HW_NOT_PRESENT => VendorErrorKind::Failure(R::NoHardware),
        codes::ERROR_HW_UNAVAILABLE => VendorErrorKind::Failure(R::HardwareUnavailable),
        codes::ERROR_LOCKOUT_PERMANENT => VendorErrorKind::PermanentLockout,
        codes::ERROR_UNABLE_TO_PROCESS | codes::ERROR_NO_SPACE => {
            VendorErrorKind::Failure(R::SensorFailed)
        }
        codes::ERROR_TIMEOUT => VendorErrorKind::Failure(R::Timeout),
        codes::ERROR_LOCKOUT => VendorErrorKind::Lockout,
        codes::ERROR_USER_CANCELED => VendorErrorKind::UserCanceled,
        codes::ERROR_CANCELED => VendorErrorKind::Canceled,
        _ => VendorErrorKind::Failure(R::Unknown),
    }
}

/// Human-readable name of a platform error code, for logs
pub fn error_code_name(code: i32) -> &'static str {
    match code {
        codes::ERROR_HW_UNAVAILABLE => "BIOMETRIC_ERROR_HW_UNAVAILABLE",
        codes::ERROR_UNABLE_TO_PROCESS => "BIOMETRIC_ERROR_UNABLE_TO_PROCESS",
        codes::ERROR_TIMEOUT => "BIOMETRIC_ERROR_TIMEOUT",
        codes::ERROR_NO_SPACE => "BIOMETRIC_ERROR_NO_SPACE",
        codes::ERROR_CANCELED => "BIOMETRIC_ERROR_CANCELED",
        codes::ERROR_LOCKOUT => "BIOMETRIC_ERROR_LOCKOUT",
        codes::ERROR_VENDOR => "BIOMETRIC_ERROR_VENDOR",
        codes::ERROR_LOCKOUT_PERMANENT => "BIOMETRIC_ERROR_LOCKOUT_PERMANENT",
        codes::ERROR_USER_CANCELED => "BIOMETRIC_ERROR_USER_CANCELED",
        codes::ERROR_NO_BIOMETRICS => "BIOMETRIC_ERROR_NO_BIOMETRICS",
        codes::ERROR_HW_NOT_PRESENT => "BIOMETRIC_ERROR_HW_NOT_PRESENT",
        _ => "BIOMETRIC_ERROR_UNKNOWN",
    }
}
