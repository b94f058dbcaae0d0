//! Request coordination
//!
//! A request goes through pre-flight checks, method reservation, the
//! permission gate and the focus wait before any vendor session starts.
//! Candidates are then driven sequentially or concurrently depending on the
//! configured [`DispatchMode`]. The caller sees exactly one terminal callback,
//! with `on_ui_opened` / `on_ui_closed` paired around it when a session ran.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::DispatchMode;
use crate::context::BiometricContext;
use crate::delivery::DeliveryQueue;
use crate::method::AuthRequest;
use crate::module::BiometricModule;
use crate::prompt::PromptInfo;
use crate::session::{run_session, HelpSink, SessionEnv, SessionOutcome};
use crate::taxonomy::{AuthenticationFailureReason, AuthenticationHelpReason};

/// Caller-facing result callbacks
///
/// Every method runs on the delivery thread. Exactly one of
/// `on_succeeded`, `on_canceled` or `on_failed` is called per request.
pub trait AuthenticationCallback: Send + Sync + 'static {
    fn on_ui_opened(&self) {}

    fn on_ui_closed(&self) {}

    fn on_succeeded(&self);

    fn on_canceled(&self);

    fn on_failed(&self, reason: AuthenticationFailureReason);

    /// Acquisition hint from the active sensor
    fn on_help(&self, _reason: AuthenticationHelpReason, _message: &str) {}
}

/// Terminal outcome of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum AuthOutcome {
    Succeeded,
    Canceled,
    Failed(AuthenticationFailureReason),
}

impl fmt::Display for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Canceled => f.write_str("canceled"),
            Self::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Handle to an in-flight request
#[derive(Debug)]
pub struct AuthenticationHandle {
    id: Uuid,
    token: CancellationToken,
    task: JoinHandle<AuthOutcome>,
}

impl AuthenticationHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cancel the request; a no-op once it has finished
    pub fn cancel(&self) {
        if !self.task.is_finished() {
            debug!(request = %self.id, "Cancel requested");
        }
        self.token.cancel();
    }

    /// Token that cancels this request when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the terminal outcome
    ///
    /// Resolves after the terminal callback (and `on_ui_closed`, if any) has
    /// run on the delivery thread.
    pub async fn outcome(self) -> AuthOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(request = %self.id, "Request task failed: {}", e);
                AuthOutcome::Failed(AuthenticationFailureReason::Unknown)
            }
        }
    }
}

/// Entry point for authentication requests
#[derive(Debug, Clone)]
pub struct Dispatcher {
    context: BiometricContext,
}

impl Dispatcher {
    pub fn new(context: BiometricContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &BiometricContext {
        &self.context
    }

    /// Start a request
    ///
    /// Must be called from within a tokio runtime. If the context is not yet
    /// initialized the request waits for it.
    pub fn authenticate(
        &self,
        request: AuthRequest,
        prompt: PromptInfo,
        callback: Arc<dyn AuthenticationCallback>,
    ) -> AuthenticationHandle {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let span = info_span!("auth", request = %id, filter = %request);

        let task = tokio::spawn(
            coordinate(self.context.clone(), request, prompt, callback, token.clone())
                .instrument(span),
        );

        AuthenticationHandle { id, token, task }
    }
}

/// Posts caller callbacks and keeps the UI open/closed pairing
struct Notifier {
    delivery: DeliveryQueue,
    callback: Arc<dyn AuthenticationCallback>,
    opened: bool,
}

impl Notifier {
    fn post<F>(&self, job: F)
    where
        F: FnOnce(&dyn AuthenticationCallback) + Send + 'static,
    {
        let callback = self.callback.clone();
        if let Err(e) = self.delivery.post(move || job(callback.as_ref())) {
            warn!("Callback dropped: {}", e);
        }
    }

    fn ui_opened(&mut self) {
        if !self.opened {
            self.opened = true;
            self.post(|cb| cb.on_ui_opened());
        }
    }

    fn help_sink(&self) -> HelpSink {
        let delivery = self.delivery.clone();
        let callback = self.callback.clone();
        Arc::new(move |_method, reason, message| {
            let callback = callback.clone();
            if let Err(e) = delivery.post(move || callback.on_help(reason, &message)) {
                warn!("Help callback dropped: {}", e);
            }
        })
    }

    async fn finish(self, outcome: AuthOutcome) -> AuthOutcome {
        info!("Request finished: {}", outcome);
        match outcome {
            AuthOutcome::Succeeded => self.post(|cb| cb.on_succeeded()),
            AuthOutcome::Canceled => self.post(|cb| cb.on_canceled()),
            AuthOutcome::Failed(reason) => self.post(move |cb| cb.on_failed(reason)),
        }
        if self.opened {
            self.post(|cb| cb.on_ui_closed());
        }
        if let Err(e) = self.delivery.flush().await {
            warn!("Could not wait for callback delivery: {}", e);
        }
        outcome
    }
}

async fn coordinate(
    context: BiometricContext,
    request: AuthRequest,
    prompt: PromptInfo,
    callback: Arc<dyn AuthenticationCallback>,
    token: CancellationToken,
) -> AuthOutcome {
    let mut notifier = Notifier {
        delivery: context.inner.delivery.clone(),
        callback,
        opened: false,
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => return notifier.finish(AuthOutcome::Canceled).await,
        _ = context.ready() => {}
    }

    let selected = tokio::select! {
        biased;
        _ = token.cancelled() => return notifier.finish(AuthOutcome::Canceled).await,
        selected = select_candidates(&context, &request) => selected,
    };
    let candidates = match selected {
        Ok(candidates) => candidates,
        Err(reason) => {
            info!("Pre-flight rejected request: {}", reason);
            return notifier.finish(AuthOutcome::Failed(reason)).await;
        }
    };

    let methods: Vec<_> = candidates.iter().map(|m| m.method()).collect();
    let reservation = context.reserve(&methods);
    if reservation.methods.len() < methods.len() {
        debug!(
            "Busy methods skipped: {:?}",
            methods
                .iter()
                .filter(|m| !reservation.methods.contains(m))
                .collect::<Vec<_>>()
        );
    }
    // A pinned request has one candidate, so a busy pin lands here too
    if reservation.methods.is_empty() {
        warn!("All candidate methods are busy");
        return notifier
            .finish(AuthOutcome::Failed(AuthenticationFailureReason::HardwareUnavailable))
            .await;
    }
    let candidates: Vec<_> = candidates
        .into_iter()
        .filter(|m| reservation.methods.contains(&m.method()))
        .collect();

    let permissions: Vec<String> = candidates
        .iter()
        .flat_map(|m| m.required_permissions())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !permissions.is_empty() {
        let granted = tokio::select! {
            biased;
            _ = token.cancelled() => return notifier.finish(AuthOutcome::Canceled).await,
            granted = context.inner.permissions.request_permissions(&permissions) => granted,
        };
        if !granted {
            info!("Permissions denied: {:?}", permissions);
            return notifier.finish(AuthOutcome::Canceled).await;
        }
    }

    let ui = context.inner.ui.clone();
    if !ui.has_window_focus() {
        debug!("Waiting for window focus");
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => return notifier.finish(AuthOutcome::Canceled).await,
        _ = ui.wait_for_focus() => {}
    }

    ui.prompt_shown(&prompt);
    notifier.ui_opened();

    let env = SessionEnv {
        lockouts: context.inner.lockouts.clone(),
        permanent: context.inner.permanent.clone(),
        policy: context.inner.policy.clone(),
        help: Some(notifier.help_sink()),
    };

    info!(
        "Starting {:?} dispatch over {:?}",
        context.inner.config.dispatch_mode, reservation.methods
    );
    let outcome = match context.inner.config.dispatch_mode {
        DispatchMode::Sequential => run_sequential(candidates, env, &token).await,
        DispatchMode::Concurrent => run_concurrent(candidates, env, &token).await,
    };

    drop(reservation);
    context.persist_lockouts().await;

    let outcome = notifier.finish(outcome).await;
    ui.prompt_dismissed();
    outcome
}

/// Pre-flight: modules the request may use, in selection order
///
/// When nothing qualifies, the reason reflects how far the best module got:
/// no hardware, then nothing enrolled, then locked out, then permanently
/// locked.
async fn select_candidates(
    context: &BiometricContext,
    request: &AuthRequest,
) -> Result<Vec<Arc<dyn BiometricModule>>, AuthenticationFailureReason> {
    let mut any_hardware = false;
    let mut any_enrolled = false;
    let mut any_unlocked = false;
    let mut candidates = Vec::new();

    let eligible = context
        .inner
        .modules
        .iter()
        .filter(|m| request.accepts(m.method()) && m.is_manager_accessible());

    for module in eligible {
        if !module.is_hardware_present().await {
            continue;
        }
        any_hardware = true;

        if !module.has_enrolled().await {
            continue;
        }
        any_enrolled = true;

        if context.is_module_locked_out(module.as_ref()).await {
            debug!("{} is locked out", module.method());
            continue;
        }
        any_unlocked = true;

        if context.inner.permanent.is_locked(module.biometric_type()) {
            debug!("{} is permanently locked", module.method());
            continue;
        }

        candidates.push(module.clone());
    }

    if !candidates.is_empty() {
        return Ok(candidates);
    }

    Err(if !any_hardware {
        AuthenticationFailureReason::NoHardware
    } else if !any_enrolled {
        AuthenticationFailureReason::NoBiometricsRegistered
    } else if !any_unlocked {
        AuthenticationFailureReason::LockedOut
    } else {
        AuthenticationFailureReason::HardwareUnavailable
    })
}

/// First non-`Unknown` reason in candidate order
fn aggregate_failures(failures: &[(usize, AuthenticationFailureReason)]) -> AuthOutcome {
    let mut failures = failures.to_vec();
    failures.sort_by_key(|(index, _)| *index);
    let reason = failures
        .iter()
        .map(|(_, reason)| *reason)
        .find(|reason| *reason != AuthenticationFailureReason::Unknown)
        .unwrap_or(AuthenticationFailureReason::Unknown);
    AuthOutcome::Failed(reason)
}

async fn run_sequential(
    candidates: Vec<Arc<dyn BiometricModule>>,
    env: SessionEnv,
    token: &CancellationToken,
) -> AuthOutcome {
    let mut failures = Vec::new();

    for (index, module) in candidates.into_iter().enumerate() {
        if token.is_cancelled() {
            return AuthOutcome::Canceled;
        }

        let method = module.method();
        match run_session(module, env.clone(), token.clone()).await {
            SessionOutcome::Succeeded => return AuthOutcome::Succeeded,
            SessionOutcome::Canceled => return AuthOutcome::Canceled,
            SessionOutcome::Failed(reason) => {
                info!("{} failed with {}, trying next candidate", method, reason);
                failures.push((index, reason));
            }
        }
    }

    aggregate_failures(&failures)
}

async fn run_concurrent(
    candidates: Vec<Arc<dyn BiometricModule>>,
    env: SessionEnv,
    token: &CancellationToken,
) -> AuthOutcome {
    let group = token.child_token();
    let mut sessions = JoinSet::new();

    for (index, module) in candidates.into_iter().enumerate() {
        let env = env.clone();
        let group = group.clone();
        sessions.spawn(async move { (index, run_session(module, env, group).await) });
    }

    let mut outcome = None;
    let mut failures = Vec::new();

    // Drain every session so none is left running after the terminal event
    while let Some(joined) = sessions.join_next().await {
        match joined {
            Ok((_, SessionOutcome::Succeeded)) => {
                if outcome.is_none() {
                    outcome = Some(AuthOutcome::Succeeded);
                    group.cancel();
                }
            }
            Ok((_, SessionOutcome::Canceled)) => {
                if outcome.is_none() {
                    outcome = Some(AuthOutcome::Canceled);
                    group.cancel();
                }
            }
            Ok((index, SessionOutcome::Failed(reason))) => failures.push((index, reason)),
            Err(e) => {
                warn!("Session task failed: {}", e);
                failures.push((usize::MAX, AuthenticationFailureReason::Unknown));
            }
        }
    }

    outcome.unwrap_or_else(|| aggregate_failures(&failures))
}
