//! Single designated callback-delivery thread
//!
//! Every caller-visible callback runs on one OS thread, one at a time, in the
//! order it was posted. Probing and coordination never happen here.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::error::{BiometricError, Result};

/// Name of the delivery thread
pub const DELIVERY_THREAD_NAME: &str = "biometric-delivery";

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Delivery {
    Job(Job),
    Barrier(oneshot::Sender<()>),
}

/// Handle for posting work to the delivery thread
///
/// The thread exits once every handle is dropped.
#[derive(Clone, Debug)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl DeliveryQueue {
    /// Start the delivery thread
    pub fn spawn() -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();

        thread::Builder::new()
            .name(DELIVERY_THREAD_NAME.to_string())
            .spawn(move || {
                debug!("Delivery thread started");
                while let Some(delivery) = rx.blocking_recv() {
                    match delivery {
                        Delivery::Job(job) => {
                            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                                error!("Callback panicked on the delivery thread");
                            }
                        }
                        Delivery::Barrier(done) => {
                            let _ = done.send(());
                        }
                    }
                }
                debug!("Delivery thread stopped");
            })
            .map_err(|e| BiometricError::Spawn(e.to_string()))?;

        Ok(Self { tx })
    }

    /// Queue `job` behind everything posted so far
    pub fn post<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx
            .send(Delivery::Job(Box::new(job)))
            .map_err(|_| BiometricError::DeliveryClosed)
    }

    /// Resolve once everything posted before this call has run
    pub async fn flush(&self) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.tx
            .send(Delivery::Barrier(done))
            .map_err(|_| BiometricError::DeliveryClosed)?;
        wait.await.map_err(|_| BiometricError::DeliveryClosed)
    }
}
