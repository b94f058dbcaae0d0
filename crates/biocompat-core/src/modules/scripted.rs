//! Scripted back-end for simulations and tests
//!
//! Each call to `authenticate` consumes the next scripted session and replays
//! its vendor events. A call with no script left starts a session that never
//! answers until it is cancelled.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ModuleError;
use crate::method::BiometricMethod;
use crate::module::{BiometricModule, VendorEvent, VendorEventSink};
use crate::taxonomy::{classify_platform_code, VendorErrorKind};

/// A module replaying predefined vendor sessions
pub struct ScriptedModule {
    method: BiometricMethod,
    accessible: bool,
    hardware: bool,
    enrolled: bool,
    vendor_locked: AtomicBool,
    permissions: Vec<String>,
    step_delay: Duration,
    probe_delay: Duration,
    classifier: fn(i32) -> VendorErrorKind,
    sessions: Mutex<VecDeque<Vec<VendorEvent>>>,
    current: Mutex<Option<CancellationToken>>,
    authenticate_calls: AtomicU32,
    cancel_calls: AtomicU32,
    overlapping: AtomicU32,
    probe_calls: AtomicU32,
}

impl ScriptedModule {
    /// A present, enrolled module with no scripted sessions
    pub fn new(method: BiometricMethod) -> Self {
        Self {
            method,
            accessible: true,
            hardware: true,
            enrolled: true,
            vendor_locked: AtomicBool::new(false),
            permissions: Vec::new(),
            step_delay: Duration::from_millis(1),
            probe_delay: Duration::ZERO,
            classifier: classify_platform_code,
            sessions: Mutex::new(VecDeque::new()),
            current: Mutex::new(None),
            authenticate_calls: AtomicU32::new(0),
            cancel_calls: AtomicU32::new(0),
            overlapping: AtomicU32::new(0),
            probe_calls: AtomicU32::new(0),
        }
    }

    /// Vendor handle could not be obtained
    pub fn inaccessible(mut self) -> Self {
        self.accessible = false;
        self
    }

    pub fn with_hardware(mut self, present: bool) -> Self {
        self.hardware = present;
        self
    }

    pub fn with_enrolled(mut self, enrolled: bool) -> Self {
        self.enrolled = enrolled;
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Delay between replayed events
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Delay before each hardware/enrollment probe answers
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    /// Vendor-specific error code mapping
    pub fn with_classifier(mut self, classifier: fn(i32) -> VendorErrorKind) -> Self {
        self.classifier = classifier;
        self
    }

    async fn probe(&self) {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
    }

    /// Append one vendor session to the script
    pub fn with_session(self, events: Vec<VendorEvent>) -> Self {
        self.sessions.lock().push_back(events);
        self
    }

    /// Toggle the live vendor lockout flag
    pub fn set_vendor_locked(&self, locked: bool) {
        self.vendor_locked.store(locked, Ordering::SeqCst);
    }

    /// Number of vendor sessions started
    pub fn authenticate_calls(&self) -> u32 {
        self.authenticate_calls.load(Ordering::SeqCst)
    }

    /// Number of `cancel` calls
    pub fn cancel_calls(&self) -> u32 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    /// Sessions started while another one was still live
    pub fn overlapping_sessions(&self) -> u32 {
        self.overlapping.load(Ordering::SeqCst)
    }

    /// Number of hardware/enrollment probes
    pub fn probe_calls(&self) -> u32 {
        self.probe_calls.load(Ordering::SeqCst)
    }

    /// Scripted sessions not yet consumed
    pub fn remaining_sessions(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[async_trait]
impl BiometricModule for ScriptedModule {
    fn method(&self) -> BiometricMethod {
        self.method
    }

    fn is_manager_accessible(&self) -> bool {
        self.accessible
    }

    async fn is_hardware_present(&self) -> bool {
        self.probe().await;
        self.accessible && self.hardware
    }

    async fn has_enrolled(&self) -> bool {
        self.probe().await;
        self.accessible && self.hardware && self.enrolled
    }

    async fn is_vendor_locked_out(&self) -> bool {
        self.vendor_locked.load(Ordering::SeqCst)
    }

    fn required_permissions(&self) -> Vec<String> {
        self.permissions.clone()
    }

    fn classify(&self, code: i32) -> VendorErrorKind {
        (self.classifier)(code)
    }

    async fn authenticate(
        &self,
        token: CancellationToken,
        sink: VendorEventSink,
    ) -> Result<(), ModuleError> {
        self.authenticate_calls.fetch_add(1, Ordering::SeqCst);

        if !self.accessible {
            return Err(ModuleError::ManagerUnavailable);
        }

        {
            let mut current = self.current.lock();
            if current.as_ref().is_some_and(|t| !t.is_cancelled()) {
                self.overlapping.fetch_add(1, Ordering::SeqCst);
            }
            *current = Some(token.clone());
        }

        let events = self.sessions.lock().pop_front().unwrap_or_default();
        let delay = self.step_delay;
        let method = self.method;

        tokio::spawn(async move {
            for event in events {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                debug!("{} (scripted) -> {:?}", method, event);
                if !sink.send(event) {
                    return;
                }
            }
            // Keep the session open until it is aborted
            token.cancelled().await;
        });

        Ok(())
    }

    async fn cancel(&self) {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.current.lock().take() {
            token.cancel();
        }
    }
}
