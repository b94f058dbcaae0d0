//! Method registry and process-wide biometric state
//!
//! [`BiometricContext`] is constructed once by the host and shared by
//! cloning. It owns the registered modules, the lockout stores, the host
//! collaborators and the delivery thread. Initialization is one-shot: the
//! `is_initialized` flag goes from `false` to `true` exactly once, and tasks
//! queued with [`BiometricContext::on_ready`] before that run exactly once
//! afterwards.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::DispatcherConfig;
use crate::delivery::DeliveryQueue;
use crate::error::{BiometricError, Result};
use crate::host::{
    AllowAll, AlwaysFocused, DeviceInfo, DeviceInfoProvider, NoDeviceInfo, PermissionGate, UiHost,
};
use crate::lockout::{Clock, LockoutTracker, PermanentLockout, SystemClock};
use crate::method::{AuthRequest, BiometricApi, BiometricMethod, BiometricType};
use crate::module::BiometricModule;
use crate::policy::{DefaultRestartPolicy, RestartPolicy};

type PendingTask = Box<dyn FnOnce() + Send + 'static>;

/// Builder for [`BiometricContext`]
pub struct BiometricContextBuilder {
    config: DispatcherConfig,
    modules: Vec<Arc<dyn BiometricModule>>,
    policy: Option<Arc<dyn RestartPolicy>>,
    permissions: Arc<dyn PermissionGate>,
    ui: Arc<dyn UiHost>,
    device_info: Arc<dyn DeviceInfoProvider>,
    clock: Arc<dyn Clock>,
}

impl Default for BiometricContextBuilder {
    fn default() -> Self {
        Self {
            config: DispatcherConfig::default(),
            modules: Vec::new(),
            policy: None,
            permissions: Arc::new(AllowAll),
            ui: Arc::new(AlwaysFocused),
            device_info: Arc::new(NoDeviceInfo),
            clock: Arc::new(SystemClock),
        }
    }
}

impl BiometricContextBuilder {
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a module; one module per method
    pub fn module(mut self, module: Arc<dyn BiometricModule>) -> Self {
        self.modules.push(module);
        self
    }

    /// Override the restart policy derived from the config
    pub fn restart_policy(mut self, policy: Arc<dyn RestartPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn permission_gate(mut self, gate: Arc<dyn PermissionGate>) -> Self {
        self.permissions = gate;
        self
    }

    pub fn ui_host(mut self, ui: Arc<dyn UiHost>) -> Self {
        self.ui = ui;
        self
    }

    pub fn device_info_provider(mut self, provider: Arc<dyn DeviceInfoProvider>) -> Self {
        self.device_info = provider;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the registration table and start the delivery thread
    pub fn build(self) -> Result<BiometricContext> {
        self.config.validate()?;

        let mut seen = HashSet::new();
        for module in &self.modules {
            if !seen.insert(module.method()) {
                return Err(BiometricError::DuplicateModule(module.method().to_string()));
            }
        }

        let mut modules = self.modules;
        modules.sort_by_key(|m| m.method().selection_key());

        let lockouts = LockoutTracker::new(self.config.lockout_window(), self.clock);
        if let Some(path) = &self.config.lockout_store_path {
            if path.exists() {
                if let Err(e) = lockouts.load(path) {
                    warn!("Failed to load lockout records from {:?}: {}", path, e);
                }
            }
        }

        let policy = self
            .policy
            .unwrap_or_else(|| Arc::new(DefaultRestartPolicy::new(self.config.max_restarts)));

        let (ready_tx, _) = watch::channel(false);

        Ok(BiometricContext {
            inner: Arc::new(ContextInner {
                modules,
                config: self.config,
                lockouts: Arc::new(lockouts),
                permanent: Arc::new(PermanentLockout::new()),
                policy,
                permissions: self.permissions,
                ui: self.ui,
                device_provider: self.device_info,
                delivery: DeliveryQueue::spawn()?,
                init_started: AtomicBool::new(false),
                initialized: AtomicBool::new(false),
                ready_tx,
                pending: Mutex::new(Some(Vec::new())),
                device_info: RwLock::new(None),
                available: RwLock::new(Vec::new()),
                busy: Mutex::new(HashSet::new()),
            }),
        })
    }
}

pub(crate) struct ContextInner {
    pub(crate) modules: Vec<Arc<dyn BiometricModule>>,
    pub(crate) config: DispatcherConfig,
    pub(crate) lockouts: Arc<LockoutTracker>,
    pub(crate) permanent: Arc<PermanentLockout>,
    pub(crate) policy: Arc<dyn RestartPolicy>,
    pub(crate) permissions: Arc<dyn PermissionGate>,
    pub(crate) ui: Arc<dyn UiHost>,
    device_provider: Arc<dyn DeviceInfoProvider>,
    pub(crate) delivery: DeliveryQueue,
    init_started: AtomicBool,
    initialized: AtomicBool,
    ready_tx: watch::Sender<bool>,
    /// `None` once the queue was drained; never reused
    pending: Mutex<Option<Vec<PendingTask>>>,
    device_info: RwLock<Option<DeviceInfo>>,
    available: RwLock<Vec<AuthRequest>>,
    busy: Mutex<HashSet<BiometricMethod>>,
}

/// Shared biometric state; cheap to clone
#[derive(Clone)]
pub struct BiometricContext {
    pub(crate) inner: Arc<ContextInner>,
}

impl std::fmt::Debug for BiometricContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BiometricContext")
            .field(
                "modules",
                &self.inner.modules.iter().map(|m| m.method()).collect::<Vec<_>>(),
            )
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl BiometricContext {
    pub fn builder() -> BiometricContextBuilder {
        BiometricContextBuilder::default()
    }

    /// Lock-free, monotonic
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    pub fn lockouts(&self) -> &Arc<LockoutTracker> {
        &self.inner.lockouts
    }

    pub fn permanent_lockouts(&self) -> &Arc<PermanentLockout> {
        &self.inner.permanent
    }

    /// Registered methods in selection order
    pub fn methods(&self) -> Vec<BiometricMethod> {
        self.inner.modules.iter().map(|m| m.method()).collect()
    }

    /// The module registered for `method`
    pub fn module(&self, method: BiometricMethod) -> Option<Arc<dyn BiometricModule>> {
        self.inner
            .modules
            .iter()
            .find(|m| m.method() == method)
            .cloned()
    }

    /// Probe every module and fetch device metadata
    ///
    /// Only the first call initializes; later calls wait for that
    /// initialization to finish.
    pub async fn init(&self) {
        if self.inner.init_started.swap(true, Ordering::AcqRel) {
            debug!("Biometric init already started");
            self.ready().await;
            return;
        }

        info!("Biometric init started ({} modules)", self.inner.modules.len());

        let timeout = self.inner.config.init_timeout();
        let provider = self.inner.device_provider.clone();
        let device_fetch = async move {
            match tokio::time::timeout(timeout, provider.device_info()).await {
                Ok(info) => info,
                Err(_) => {
                    warn!("Device info not available after {:?}, continuing without it", timeout);
                    None
                }
            }
        };

        let (_, device_info) = tokio::join!(self.log_probes(), device_fetch);
        if let Some(info) = &device_info {
            debug!("Device info: {} -> {:?}", info.model, info.sensors);
        }
        *self.inner.device_info.write() = device_info;

        let available = self.compute_available_requests().await;
        info!("Available auth requests: {}", available.len());
        *self.inner.available.write() = available;

        for kind in self.undetected_sensors() {
            warn!("Device metadata lists a {} sensor but no module detected it", kind);
        }

        // Queued tasks reach the delivery thread before any `on_ready` call
        // that observes the initialized flag
        {
            let mut pending = self.inner.pending.lock();
            self.inner.initialized.store(true, Ordering::Release);
            let tasks = pending.take().unwrap_or_default();
            info!("Biometric init finished, running {} pending tasks", tasks.len());
            for task in tasks {
                if let Err(e) = self.inner.delivery.post(task) {
                    warn!("Dropping pending task: {}", e);
                }
            }
        }
        self.inner.ready_tx.send_replace(true);
    }

    /// Probe every module concurrently and log what was found
    async fn log_probes(&self) {
        let mut probes = JoinSet::new();
        for module in self.inner.modules.iter().cloned() {
            probes.spawn(async move {
                let accessible = module.is_manager_accessible();
                let hardware = accessible && module.is_hardware_present().await;
                let enrolled = hardware && module.has_enrolled().await;
                (module.method(), accessible, hardware, enrolled)
            });
        }

        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((method, accessible, hardware, enrolled)) => debug!(
                    "{}: accessible={} hardware={} enrolled={}",
                    method, accessible, hardware, enrolled
                ),
                Err(e) => warn!("Module probe failed: {}", e),
            }
        }
    }

    async fn compute_available_requests(&self) -> Vec<AuthRequest> {
        let mut requests = Vec::new();

        let default = AuthRequest::default();
        if self.hardware_detected(&default).await {
            requests.push(default);
        }

        for api in [BiometricApi::Auto, BiometricApi::Legacy, BiometricApi::Unified] {
            for kind in BiometricType::CONCRETE {
                let request = AuthRequest::new(api, kind);
                if self.hardware_detected(&request).await {
                    requests.push(request);
                }
            }
        }

        requests
    }

    /// Resolve once initialization has finished
    pub async fn ready(&self) {
        if self.is_initialized() {
            return;
        }
        let mut rx = self.inner.ready_tx.subscribe();
        // The sender lives in the context, so the channel cannot close here
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Run `task` on the delivery thread once initialized
    ///
    /// Before initialization the task is queued; afterwards it is posted
    /// immediately.
    pub fn on_ready<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.inner.pending.lock();
        match pending.as_mut() {
            Some(queue) if !self.is_initialized() => {
                debug!("Biometric init pending, queueing task");
                queue.push(Box::new(task));
                Ok(())
            }
            _ => {
                drop(pending);
                self.inner.delivery.post(task)
            }
        }
    }

    /// Requests with hardware present, computed at init
    pub fn available_auth_requests(&self) -> Vec<AuthRequest> {
        self.inner.available.read().clone()
    }

    /// Device metadata fetched at init, if any
    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.inner.device_info.read().clone()
    }

    /// Categories the device metadata lists with no detected module behind them
    pub fn undetected_sensors(&self) -> Vec<BiometricType> {
        let Some(info) = self.device_info() else {
            return Vec::new();
        };
        let available = self.inner.available.read();
        BiometricType::CONCRETE
            .into_iter()
            .filter(|kind| info.reports(*kind) == Some(true))
            .filter(|kind| !available.iter().any(|r| r.kind == *kind))
            .collect()
    }

    /// The device was unlocked with the system credential
    pub fn on_device_unlocked(&self) {
        info!("Device unlocked, clearing permanent lockouts");
        self.inner.permanent.reset();
    }

    fn eligible<'a>(
        &'a self,
        request: &'a AuthRequest,
    ) -> impl Iterator<Item = &'a Arc<dyn BiometricModule>> + 'a {
        self.inner
            .modules
            .iter()
            .filter(move |m| request.accepts(m.method()) && m.is_manager_accessible())
    }

    async fn hardware_detected(&self, request: &AuthRequest) -> bool {
        for module in self.eligible(request) {
            if module.is_hardware_present().await {
                return true;
            }
        }
        false
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(BiometricError::NotInitialized)
        }
    }

    /// Whether any eligible module has its sensor present
    pub async fn is_hardware_detected(&self, request: &AuthRequest) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.hardware_detected(request).await)
    }

    /// Whether any eligible module with hardware has biometrics enrolled
    pub async fn has_enrolled(&self, request: &AuthRequest) -> Result<bool> {
        self.ensure_initialized()?;
        for module in self.eligible(request) {
            if module.is_hardware_present().await && module.has_enrolled().await {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether any eligible module is locked out
    pub async fn is_locked_out(&self, request: &AuthRequest) -> Result<bool> {
        self.ensure_initialized()?;
        for module in self.eligible(request) {
            if self.is_module_locked_out(module.as_ref()).await {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether the request's category was permanently locked by a vendor
    pub fn is_permanently_locked(&self, request: &AuthRequest) -> Result<bool> {
        self.ensure_initialized()?;
        let kind = request
            .method
            .map(|m| m.biometric_type())
            .unwrap_or(request.kind);
        Ok(self.inner.permanent.is_locked(kind))
    }

    /// Whether a unified-API back-end serves the request
    pub async fn is_unified_api(&self, request: &AuthRequest) -> Result<bool> {
        self.ensure_initialized()?;
        for module in self.eligible(request) {
            if module.method().api() == BiometricApi::Unified && module.is_hardware_present().await
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Shared lockout record combined with the vendor's own lockout query
    pub(crate) async fn is_module_locked_out(&self, module: &dyn BiometricModule) -> bool {
        self.inner.lockouts.is_locked_out(module.method()) || module.is_vendor_locked_out().await
    }

    /// Reserve methods for one request; busy methods are left out
    pub(crate) fn reserve(&self, methods: &[BiometricMethod]) -> Reservation {
        let mut busy = self.inner.busy.lock();
        let reserved = methods
            .iter()
            .copied()
            .filter(|m| busy.insert(*m))
            .collect();
        Reservation {
            context: self.clone(),
            methods: reserved,
        }
    }

    /// Persist lockout records if a store path is configured
    pub(crate) async fn persist_lockouts(&self) {
        let Some(path) = self.inner.config.lockout_store_path.clone() else {
            return;
        };
        let lockouts = self.inner.lockouts.clone();
        let saved = tokio::task::spawn_blocking(move || {
            let result = lockouts.save(&path);
            (path, result)
        })
        .await;

        match saved {
            Ok((_, Ok(()))) => {}
            Ok((path, Err(e))) => {
                warn!("Failed to persist lockout records to {:?}: {}", path, e)
            }
            Err(e) => warn!("Lockout persistence task failed: {}", e),
        }
    }
}

/// Methods held by one in-flight request; released on drop
pub(crate) struct Reservation {
    context: BiometricContext,
    pub(crate) methods: Vec<BiometricMethod>,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut busy = self.context.inner.busy.lock();
        for method in &self.methods {
            busy.remove(method);
        }
    }
}
