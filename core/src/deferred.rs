//! Externally settled promises and the conformance adapter.

use crate::promise::{Promise, Rejecter, Resolver, resolving_functions};
use crate::scheduler::Scheduler;
use crate::value::Value;

/// A pending promise together with its resolving functions, for code that
/// settles the promise from outside any executor.
#[derive(Debug, Clone)]
pub struct Deferred {
    promise: Promise,
    resolve: Resolver,
    reject: Rejecter,
}

impl Deferred {
    #[must_use]
    pub fn new(scheduler: &Scheduler) -> Self {
        let promise = Promise::pending(scheduler);
        let (resolve, reject) = resolving_functions(&promise);
        Self {
            promise,
            resolve,
            reject,
        }
    }

    #[must_use]
    pub fn promise(&self) -> &Promise {
        &self.promise
    }

    /// Same one-shot semantics as the resolver handed to an executor.
    pub fn resolve(&self, value: impl Into<Value>) {
        self.resolve.resolve(value);
    }

    pub fn reject(&self, reason: impl Into<Value>) {
        self.reject.reject(reason);
    }

    #[must_use]
    pub fn into_parts(self) -> (Promise, Resolver, Rejecter) {
        (self.promise, self.resolve, self.reject)
    }
}

/// The construction surface a conformance suite drives.
pub trait Adapter {
    fn deferred(&self) -> Deferred;

    fn resolved(&self, value: Value) -> Promise;

    fn rejected(&self, reason: Value) -> Promise;
}

impl Adapter for Scheduler {
    fn deferred(&self) -> Deferred {
        Deferred::new(self)
    }

    fn resolved(&self, value: Value) -> Promise {
        Promise::resolve(self, value)
    }

    fn rejected(&self, reason: Value) -> Promise {
        Promise::reject(self, reason)
    }
}
