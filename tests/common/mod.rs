//! Shared test utilities and fixtures
//!
//! A deterministic queue host plus a handful of foreign thenables.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use aplus_core::{JobQueue, Rejecter, Resolver, Schedule, Scheduler, State, Thenable, Value};

/// A queue host whose jobs the test drains explicitly.
pub struct TestHost {
    pub queue: JobQueue,
    pub scheduler: Scheduler,
}

impl TestHost {
    pub fn new() -> Self {
        let queue = JobQueue::new();
        let scheduler = queue.scheduler();
        Self { queue, scheduler }
    }

    /// Run every queued job, including ones scheduled while draining.
    pub fn drain(&self) -> usize {
        self.queue.run_until_idle().expect("unbounded queue drains")
    }
}

/// Ordered record of side effects observed by callbacks.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub fn fulfilled(value: impl Into<Value>) -> State {
    State::Fulfilled(value.into())
}

pub fn rejected(reason: impl Into<Value>) -> State {
    State::Rejected(reason.into())
}

/// Resolves synchronously with the wrapped value.
#[derive(Debug)]
pub struct SyncThenable(pub Value);

impl Thenable for SyncThenable {
    fn then(&self, resolve: Resolver, _reject: Rejecter) -> Result<(), Value> {
        resolve.resolve(self.0.clone());
        Ok(())
    }
}

/// Rejects synchronously with the wrapped reason.
#[derive(Debug)]
pub struct RejectingThenable(pub Value);

impl Thenable for RejectingThenable {
    fn then(&self, _resolve: Resolver, reject: Rejecter) -> Result<(), Value> {
        reject.reject(self.0.clone());
        Ok(())
    }
}

/// Settles on a later turn of the host's queue.
#[derive(Debug)]
pub struct DeferredThenable {
    pub queue: JobQueue,
    pub value: Value,
}

impl Thenable for DeferredThenable {
    fn then(&self, resolve: Resolver, _reject: Rejecter) -> Result<(), Value> {
        let value = self.value.clone();
        self.queue
            .schedule(Box::new(move || resolve.resolve(value)));
        Ok(())
    }
}

/// Raises from `then` without calling either callback.
#[derive(Debug)]
pub struct ThrowingThenable(pub Value);

impl Thenable for ThrowingThenable {
    fn then(&self, _resolve: Resolver, _reject: Rejecter) -> Result<(), Value> {
        Err(self.0.clone())
    }
}
