//! Restart decisions for failed authentication attempts

use crate::taxonomy::AuthenticationFailureReason;

/// Default number of silent restarts for transient failures
pub const DEFAULT_MAX_RESTARTS: u32 = 2;

/// Decides whether a failed attempt should be retried
///
/// `restarts_so_far` counts the restarts already performed within the current
/// module session, so the first failure is asked with `0`.
pub trait RestartPolicy: Send + Sync {
    fn should_restart(&self, reason: AuthenticationFailureReason, restarts_so_far: u32) -> bool;
}

impl<F> RestartPolicy for F
where
    F: Fn(AuthenticationFailureReason, u32) -> bool + Send + Sync,
{
    fn should_restart(&self, reason: AuthenticationFailureReason, restarts_so_far: u32) -> bool {
        self(reason, restarts_so_far)
    }
}

/// Retries transient failures a bounded number of times
#[derive(Clone, Debug)]
pub struct DefaultRestartPolicy {
    max_restarts: u32,
}

impl Default for DefaultRestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: DEFAULT_MAX_RESTARTS,
        }
    }
}

impl DefaultRestartPolicy {
    /// Create a policy allowing `max_restarts` restarts
    pub fn new(max_restarts: u32) -> Self {
        Self { max_restarts }
    }

    /// Maximum restarts before the failure becomes terminal
    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }
}

impl RestartPolicy for DefaultRestartPolicy {
    fn should_restart(&self, reason: AuthenticationFailureReason, restarts_so_far: u32) -> bool {
        reason.is_transient() && restarts_so_far < self.max_restarts
    }
}

/// Never restarts
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverRestart;

impl RestartPolicy for NeverRestart {
    fn should_restart(&self, _reason: AuthenticationFailureReason, _restarts_so_far: u32) -> bool {
        false
    }
}
