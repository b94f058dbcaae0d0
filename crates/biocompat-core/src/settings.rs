//! Enrollment settings routing
//!
//! Opening the system's biometric settings is best effort: a list of actions
//! is tried in priority order and the first one the host accepts wins.

use std::fmt;

use tracing::debug;

use crate::method::BiometricType;

/// One way of opening enrollment settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsAction {
    /// Vendor IFAA manager entry point; auth type 1 fingerprint, 2 iris, 0 other
    VendorManager { auth_type: u8 },
    /// Intent action string
    Action(&'static str),
    /// Explicit settings component
    Component {
        package: &'static str,
        class: &'static str,
    },
}

impl fmt::Display for SettingsAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VendorManager { auth_type } => write!(f, "vendor-manager:{}", auth_type),
            Self::Action(action) => f.write_str(action),
            Self::Component { package, class } => write!(f, "{}/{}", package, class),
        }
    }
}

/// Launches settings actions on the host
pub trait SettingsLauncher {
    /// Returns `true` when the host accepted the action
    fn try_launch(&self, action: &SettingsAction) -> bool;
}

const SETTINGS_PACKAGE: &str = "com.android.settings";

/// Actions to try, in order, for `kind`
pub fn settings_actions(kind: BiometricType, unified_api: bool) -> Vec<SettingsAction> {
    let auth_type = match kind {
        BiometricType::Fingerprint => 1,
        BiometricType::Iris => 2,
        _ => 0,
    };

    let mut actions = vec![SettingsAction::VendorManager { auth_type }];

    if unified_api {
        actions.extend([
            SettingsAction::Action("android.settings.BIOMETRIC_ENROLL"),
            SettingsAction::Action("android.settings.BIOMETRIC_SETTINGS"),
            SettingsAction::Component {
                package: SETTINGS_PACKAGE,
                class: "com.android.settings.Settings$BiometricsAndSecuritySettingsActivity",
            },
        ]);
    } else {
        actions.push(SettingsAction::Action("android.settings.FINGERPRINT_ENROLL"));
    }

    actions.extend([
        SettingsAction::Component {
            package: SETTINGS_PACKAGE,
            class: "com.android.settings.Settings$SecuritySettingsActivity",
        },
        SettingsAction::Action("android.settings.SECURITY_SETTINGS"),
        SettingsAction::Action("android.settings.SETTINGS"),
    ]);

    actions
}

/// Try each action until one is accepted; returns the accepted action
pub fn open_settings(
    launcher: &dyn SettingsLauncher,
    kind: BiometricType,
    unified_api: bool,
) -> Option<SettingsAction> {
    for action in settings_actions(kind, unified_api) {
        if launcher.try_launch(&action) {
            debug!("Opened settings via {}", action);
            return Some(action);
        }
        debug!("Settings action rejected: {}", action);
    }
    None
}
