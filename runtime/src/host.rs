//! Assembling a scheduler from configuration.

use aplus_config::{AplusConfig, SchedulerKind};
use aplus_core::{JobQueue, QueueError, Scheduler};
use thiserror::Error;

use crate::logging::init_tracing_from_config;
use crate::tokio_scheduler::TokioScheduler;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("the tokio scheduler requires a running tokio runtime")]
    NoRuntime,
}

/// A configured [`Scheduler`] plus, for the queue host, the queue the
/// embedder drains.
#[derive(Debug, Clone)]
pub struct Host {
    scheduler: Scheduler,
    queue: Option<JobQueue>,
}

impl Host {
    pub fn from_config(config: &AplusConfig) -> Result<Self, HostError> {
        let settings = &config.scheduler;
        let policy = config.diagnostics.unhandled_rejections;

        let host = match settings.kind {
            SchedulerKind::Queue => {
                let queue = JobQueue::configured(settings.initial_capacity, settings.drain_budget);
                Self {
                    scheduler: queue.scheduler().with_unhandled_rejections(policy),
                    queue: Some(queue),
                }
            }
            SchedulerKind::Tokio => {
                let driver = TokioScheduler::try_current(settings.yield_every)?;
                Self {
                    scheduler: Scheduler::new(driver).with_unhandled_rejections(policy),
                    queue: None,
                }
            }
        };

        tracing::debug!(
            kind = settings.kind.as_str(),
            unhandled_rejections = policy.as_str(),
            "Promise host ready"
        );
        Ok(host)
    }

    /// Build from the user's config file, or from defaults when there is
    /// none or it cannot be loaded.
    ///
    /// Also installs the tracing subscriber with the file's `log_filter`,
    /// unless one is already installed.
    pub fn load() -> Result<Self, HostError> {
        let config = AplusConfig::load().ok().flatten().unwrap_or_default();
        init_tracing_from_config(&config);
        Self::from_config(&config)
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The queue to drain, when this is a queue host.
    #[must_use]
    pub fn queue(&self) -> Option<&JobQueue> {
        self.queue.as_ref()
    }

    #[must_use]
    pub fn kind(&self) -> SchedulerKind {
        if self.queue.is_some() {
            SchedulerKind::Queue
        } else {
            SchedulerKind::Tokio
        }
    }

    /// Drain the queue host. A tokio host runs jobs on its own and reports
    /// zero.
    pub fn run_until_idle(&self) -> Result<usize, QueueError> {
        self.queue.as_ref().map_or(Ok(0), JobQueue::run_until_idle)
    }
}
