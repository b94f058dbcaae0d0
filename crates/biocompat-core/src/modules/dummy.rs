//! Placeholder back-end that never authenticates

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ModuleError;
use crate::method::BiometricMethod;
use crate::module::{BiometricModule, VendorEvent, VendorEventSink};

/// Delay before the dummy reports its failure
pub const DUMMY_FAILURE_DELAY: Duration = Duration::from_millis(2500);

/// Reports hardware and enrollment but is never manager-accessible, so the
/// dispatcher never selects it. When driven directly it fails every attempt.
#[derive(Debug, Default)]
pub struct DummyModule;

#[async_trait]
impl BiometricModule for DummyModule {
    fn method(&self) -> BiometricMethod {
        BiometricMethod::Dummy
    }

    fn is_manager_accessible(&self) -> bool {
        false
    }

    async fn is_hardware_present(&self) -> bool {
        true
    }

    async fn has_enrolled(&self) -> bool {
        true
    }

    async fn authenticate(
        &self,
        token: CancellationToken,
        sink: VendorEventSink,
    ) -> Result<(), ModuleError> {
        debug!("{}.authenticate", self.name());
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(DUMMY_FAILURE_DELAY) => {
                    sink.send(VendorEvent::NoMatch);
                    token.cancelled().await;
                }
            }
        });
        Ok(())
    }

    async fn cancel(&self) {}
}
