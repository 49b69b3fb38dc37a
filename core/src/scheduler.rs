//! The host capability that runs reactions on a later turn.
//!
//! The promise machinery never runs a continuation synchronously. It hands a
//! [`Job`] to a [`Schedule`] implementation and trusts the host to run it
//! later, in submission order. [`JobQueue`] is the deterministic host used by
//! tests and embedders that own their event loop; other hosts (a tokio task,
//! a GUI idle callback) implement [`Schedule`] themselves.

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;

use crate::errors::QueueError;

/// A unit of deferred work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs on a later turn.
///
/// Implementations must preserve submission order for jobs and must never run
/// a job inside the `schedule` call itself.
pub trait Schedule: Send + Sync {
    fn schedule(&self, job: Job);
}

/// What to do when a rejected promise is dropped without any reaction ever
/// having been registered on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnhandledRejections {
    #[default]
    Warn,
    Debug,
    Off,
}

impl UnhandledRejections {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Debug => "debug",
            Self::Off => "off",
        }
    }
}

/// Shared handle to a host's scheduling capability.
///
/// Every promise keeps a clone so that reactions registered on it, and
/// promises derived from it, run on the same host.
#[derive(Clone)]
pub struct Scheduler {
    host: Arc<dyn Schedule>,
    unhandled_rejections: UnhandledRejections,
}

impl Scheduler {
    pub fn new(host: impl Schedule + 'static) -> Self {
        Self {
            host: Arc::new(host),
            unhandled_rejections: UnhandledRejections::default(),
        }
    }

    pub fn with_unhandled_rejections(mut self, policy: UnhandledRejections) -> Self {
        self.unhandled_rejections = policy;
        self
    }

    #[must_use]
    pub fn unhandled_rejections(&self) -> UnhandledRejections {
        self.unhandled_rejections
    }

    pub(crate) fn schedule(&self, job: Job) {
        self.host.schedule(job);
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("unhandled_rejections", &self.unhandled_rejections)
            .finish_non_exhaustive()
    }
}

impl From<JobQueue> for Scheduler {
    fn from(queue: JobQueue) -> Self {
        Self::new(queue)
    }
}

// ============================================================================
// JobQueue
// ============================================================================

#[derive(Default)]
struct QueueState {
    jobs: Mutex<VecDeque<Job>>,
    drain_budget: Option<NonZeroUsize>,
}

/// A FIFO microtask queue drained explicitly by its owner.
///
/// Cloning yields another handle to the same queue. Jobs may schedule more
/// jobs while running; those run in the same drain.
#[derive(Clone, Default)]
pub struct JobQueue {
    state: Arc<QueueState>,
}

impl JobQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue with a pre-sized buffer and an optional cap on how many jobs a
    /// single [`run_until_idle`](Self::run_until_idle) call may run.
    #[must_use]
    pub fn configured(initial_capacity: usize, drain_budget: Option<NonZeroUsize>) -> Self {
        Self {
            state: Arc::new(QueueState {
                jobs: Mutex::new(VecDeque::with_capacity(initial_capacity)),
                drain_budget,
            }),
        }
    }

    /// A [`Scheduler`] that submits to this queue.
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.clone())
    }

    #[must_use]
    pub fn drain_budget(&self) -> Option<NonZeroUsize> {
        self.state.drain_budget
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Run the oldest queued job. Returns `false` when the queue was empty.
    pub fn run_next(&self) -> bool {
        // The lock is released before the job runs so it can schedule more work.
        let job = self.jobs().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run jobs until the queue is empty, returning how many ran.
    pub fn run_until_idle(&self) -> Result<usize, QueueError> {
        let mut ran = 0_usize;
        loop {
            if let Some(budget) = self.state.drain_budget
                && ran >= budget.get()
            {
                let pending = self.len();
                if pending == 0 {
                    return Ok(ran);
                }
                tracing::warn!(budget = budget.get(), pending, "Job queue drain budget exhausted");
                return Err(QueueError::BudgetExhausted {
                    budget: budget.get(),
                    pending,
                });
            }
            if !self.run_next() {
                return Ok(ran);
            }
            ran += 1;
        }
    }

    fn jobs(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.state
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Schedule for JobQueue {
    fn schedule(&self, job: Job) {
        self.jobs().push_back(job);
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("pending", &self.len())
            .field("drain_budget", &self.state.drain_budget)
            .finish()
    }
}
