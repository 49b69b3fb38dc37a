//! A [`Schedule`] host backed by a tokio task.

use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};

use aplus_core::{ErrorValue, Job, Schedule};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task;

use crate::host::HostError;

/// Sends jobs over an unbounded channel to a single driver task, which runs
/// them one at a time in submission order.
///
/// The driver stops once every handle to the scheduler is gone.
#[derive(Clone)]
pub struct TokioScheduler {
    jobs_tx: mpsc::UnboundedSender<Job>,
}

impl TokioScheduler {
    /// Spawn the driver on `handle`. The driver yields back to the runtime
    /// after every `yield_every` jobs.
    pub fn start(handle: &Handle, yield_every: NonZeroUsize) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        handle.spawn(drive(jobs_rx, yield_every));
        tracing::debug!(yield_every = yield_every.get(), "Scheduler driver started");
        Self { jobs_tx }
    }

    /// Spawn the driver on the runtime the caller is running in.
    pub fn try_current(yield_every: NonZeroUsize) -> Result<Self, HostError> {
        let handle = Handle::try_current().map_err(|_| HostError::NoRuntime)?;
        Ok(Self::start(&handle, yield_every))
    }

    /// Whether the driver task is still accepting jobs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.jobs_tx.is_closed()
    }
}

async fn drive(mut jobs_rx: mpsc::UnboundedReceiver<Job>, yield_every: NonZeroUsize) {
    let mut since_yield = 0_usize;
    while let Some(job) = jobs_rx.recv().await {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            let err = ErrorValue::from_panic(payload.as_ref());
            tracing::warn!(%err, "Scheduled job panicked");
        }
        since_yield += 1;
        if since_yield >= yield_every.get() {
            since_yield = 0;
            task::yield_now().await;
        }
    }
    tracing::debug!("Scheduler driver stopped");
}

impl Schedule for TokioScheduler {
    fn schedule(&self, job: Job) {
        if self.jobs_tx.send(job).is_err() {
            tracing::warn!("Scheduler driver is gone; dropping job");
        }
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("running", &self.is_running())
            .finish()
    }
}
