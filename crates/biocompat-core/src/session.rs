//! Session driver shared by every module
//!
//! Runs one module through IDLE -> AUTHENTICATING -> {SUCCESS, FAILED,
//! CANCELED}, restarting the vendor session while the restart policy allows
//! it. Vendor codes are classified here, so individual modules never see the
//! policy or the lockout tracker.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::lockout::{LockoutTracker, PermanentLockout};
use crate::method::BiometricMethod;
use crate::module::{BiometricModule, VendorEvent, VendorEventSink};
use crate::policy::RestartPolicy;
use crate::taxonomy::{
    error_code_name, AuthenticationFailureReason, AuthenticationHelpReason, VendorErrorKind,
};

/// Receives acquisition hints while a session runs
pub type HelpSink = Arc<dyn Fn(BiometricMethod, AuthenticationHelpReason, String) + Send + Sync>;

/// Terminal result of one module session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Succeeded,
    Failed(AuthenticationFailureReason),
    Canceled,
}

/// Shared state a session needs besides the module itself
#[derive(Clone)]
pub struct SessionEnv {
    pub lockouts: Arc<LockoutTracker>,
    pub permanent: Arc<PermanentLockout>,
    pub policy: Arc<dyn RestartPolicy>,
    pub help: Option<HelpSink>,
}

impl fmt::Debug for SessionEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEnv")
            .field("lockouts", &self.lockouts)
            .field("permanent", &self.permanent)
            .finish_non_exhaustive()
    }
}

/// What one vendor session ended with
enum Attempt {
    Succeeded,
    Canceled,
    Failed(AuthenticationFailureReason),
}

/// Drive `module` until a terminal outcome or cancellation of `token`
pub async fn run_session(
    module: Arc<dyn BiometricModule>,
    env: SessionEnv,
    token: CancellationToken,
) -> SessionOutcome {
    let method = module.method();
    let mut restarts = 0u32;

    loop {
        if token.is_cancelled() {
            module.cancel().await;
            return SessionOutcome::Canceled;
        }

        let session_token = token.child_token();
        let attempt = run_attempt(module.as_ref(), &env, &token, &session_token).await;
        session_token.cancel();

        let reason = match attempt {
            Attempt::Succeeded => {
                info!("{}: authentication succeeded", method);
                return SessionOutcome::Succeeded;
            }
            Attempt::Canceled => {
                module.cancel().await;
                return SessionOutcome::Canceled;
            }
            Attempt::Failed(reason) => reason,
        };

        // Only one vendor session may be outstanding before a restart
        module.cancel().await;

        if env.policy.should_restart(reason, restarts) {
            restarts += 1;
            info!("{}: {} - restarting (restart {})", method, reason, restarts);
            continue;
        }

        if reason.is_transient() {
            env.lockouts.lockout(method);
            warn!("{}: {} after {} restarts, locking out", method, reason, restarts);
            return SessionOutcome::Failed(AuthenticationFailureReason::LockedOut);
        }

        info!("{}: failed with {}", method, reason);
        return SessionOutcome::Failed(reason);
    }
}

/// Run a single vendor session
async fn run_attempt(
    module: &dyn BiometricModule,
    env: &SessionEnv,
    token: &CancellationToken,
    session_token: &CancellationToken,
) -> Attempt {
    let method = module.method();
    let (sink, mut rx) = VendorEventSink::channel();

    debug!("{}.authenticate", method);
    if let Err(e) = module.authenticate(session_token.clone(), sink).await {
        warn!("{}: authenticate failed unexpectedly: {}", method, e);
        return Attempt::Failed(AuthenticationFailureReason::Unknown);
    }

    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => return Attempt::Canceled,
            event = rx.recv() => event,
        };

        let Some(event) = event else {
            warn!("{}: vendor session ended without a result", method);
            return Attempt::Failed(AuthenticationFailureReason::Unknown);
        };

        match event {
            VendorEvent::Succeeded => return Attempt::Succeeded,
            VendorEvent::NoMatch => {
                debug!("{}.onAuthenticationFailed", method);
                return Attempt::Failed(AuthenticationFailureReason::AuthenticationFailed);
            }
            VendorEvent::Help { code, message } => {
                let reason = AuthenticationHelpReason::from_code(code);
                debug!("{}.onAuthenticationHelp: {:?} - {}", method, reason, message);
                if let Some(help) = &env.help {
                    help(method, reason, message);
                }
            }
            VendorEvent::Error { code, message } => {
                debug!(
                    "{}.onAuthenticationError: {} - {}",
                    method,
                    error_code_name(code),
                    message
                );
                return match module.classify(code) {
                    VendorErrorKind::Failure(reason) => Attempt::Failed(reason),
                    VendorErrorKind::Lockout => {
                        env.lockouts.lockout(method);
                        Attempt::Failed(AuthenticationFailureReason::LockedOut)
                    }
                    VendorErrorKind::PermanentLockout => {
                        env.permanent.mark(method.biometric_type());
                        Attempt::Failed(AuthenticationFailureReason::HardwareUnavailable)
                    }
                    VendorErrorKind::UserCanceled | VendorErrorKind::Canceled => Attempt::Canceled,
                };
            }
        }
    }
}
