//! Contracts for the host environment
//!
//! The core never renders UI or asks for permissions itself. It consumes
//! these narrow interfaces, implemented by the embedding application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::method::BiometricType;
use crate::prompt::PromptInfo;

/// Grants the permissions a back-end needs
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Resolve to `true` once every permission is granted
    async fn request_permissions(&self, permissions: &[String]) -> bool;
}

/// Grants everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl PermissionGate for AllowAll {
    async fn request_permissions(&self, _permissions: &[String]) -> bool {
        true
    }
}

/// The window hosting the biometric prompt
///
/// Vendor biometric UIs only work in the focused window, so a session is
/// started only after `wait_for_focus` resolves.
#[async_trait]
pub trait UiHost: Send + Sync {
    fn has_window_focus(&self) -> bool;

    /// Resolve once the window has input focus
    async fn wait_for_focus(&self);

    /// Called right before the first vendor session starts
    fn prompt_shown(&self, _prompt: &PromptInfo) {}

    /// Called after the terminal callback was delivered
    fn prompt_dismissed(&self) {}
}

/// A host whose window is always focused
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysFocused;

#[async_trait]
impl UiHost for AlwaysFocused {
    fn has_window_focus(&self) -> bool {
        true
    }

    async fn wait_for_focus(&self) {}
}

/// Focus state driven by the host through a watch channel
#[derive(Debug)]
pub struct FocusWatch {
    tx: watch::Sender<bool>,
}

impl FocusWatch {
    pub fn new(focused: bool) -> Self {
        let (tx, _) = watch::channel(focused);
        Self { tx }
    }

    /// Report a focus change
    pub fn set_focused(&self, focused: bool) {
        self.tx.send_replace(focused);
    }
}

#[async_trait]
impl UiHost for FocusWatch {
    fn has_window_focus(&self) -> bool {
        *self.tx.borrow()
    }

    async fn wait_for_focus(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = rx.wait_for(|focused| *focused).await;
    }
}

/// Sensor metadata for the current device model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: String,
    /// Sensor description strings; `None` when the model was not found
    pub sensors: Option<Vec<String>>,
}

impl DeviceInfo {
    pub fn new(model: impl Into<String>, sensors: Option<Vec<String>>) -> Self {
        Self {
            model: model.into(),
            sensors,
        }
    }

    fn sensors_lowercase(&self) -> impl Iterator<Item = String> + '_ {
        self.sensors
            .iter()
            .flatten()
            .map(|s| s.to_lowercase())
    }

    fn is_auth_sensor(s: &str) -> bool {
        [" id", " recognition", " unlock", " auth"]
            .iter()
            .any(|marker| s.contains(marker))
    }

    pub fn has_fingerprint(&self) -> bool {
        self.sensors_lowercase().any(|s| s.contains("fingerprint"))
    }

    pub fn has_under_display_fingerprint(&self) -> bool {
        self.sensors_lowercase()
            .any(|s| s.contains("fingerprint") && s.contains("under display"))
    }

    pub fn has_face_id(&self) -> bool {
        self.sensors_lowercase()
            .any(|s| Self::is_auth_sensor(&s) && s.contains("face"))
    }

    pub fn has_iris_scanner(&self) -> bool {
        self.sensors_lowercase()
            .any(|s| Self::is_auth_sensor(&s) && s.contains("iris"))
    }

    /// Whether the metadata lists a sensor of `kind`; `None` when unknown
    pub fn reports(&self, kind: BiometricType) -> Option<bool> {
        self.sensors.as_ref()?;
        Some(match kind {
            BiometricType::Any => {
                self.has_fingerprint() || self.has_face_id() || self.has_iris_scanner()
            }
            BiometricType::Fingerprint => self.has_fingerprint(),
            BiometricType::Face => self.has_face_id(),
            BiometricType::Iris => self.has_iris_scanner(),
        })
    }
}

/// Best-effort device metadata source
#[async_trait]
pub trait DeviceInfoProvider: Send + Sync {
    /// May be slow; `None` means unknown sensors
    async fn device_info(&self) -> Option<DeviceInfo>;
}

/// Provides no metadata
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDeviceInfo;

#[async_trait]
impl DeviceInfoProvider for NoDeviceInfo {
    async fn device_info(&self) -> Option<DeviceInfo> {
        None
    }
}

/// Provides fixed metadata
#[derive(Debug, Clone)]
pub struct StaticDeviceInfo(pub DeviceInfo);

#[async_trait]
impl DeviceInfoProvider for StaticDeviceInfo {
    async fn device_info(&self) -> Option<DeviceInfo> {
        Some(self.0.clone())
    }
}
