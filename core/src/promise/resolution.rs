//! The promise resolution procedure and the one-shot resolving functions.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::ErrorValue;
use crate::thenable::Thenable;
use crate::value::Value;

use super::{Promise, Reaction, Settlement, guard};

/// Resolves the promise it was created for. Cloning shares the one-shot
/// latch with the paired [`Rejecter`].
#[derive(Clone)]
pub struct Resolver {
    promise: Promise,
    latch: Arc<AtomicBool>,
}

/// Rejects the promise it was created for. Cloning shares the one-shot
/// latch with the paired [`Resolver`].
#[derive(Clone)]
pub struct Rejecter {
    promise: Promise,
    latch: Arc<AtomicBool>,
}

/// A fresh resolver/rejecter pair for `promise`. Across both functions and
/// all their clones, only the first call has any effect.
pub(crate) fn resolving_functions(promise: &Promise) -> (Resolver, Rejecter) {
    let latch = Arc::new(AtomicBool::new(false));
    (
        Resolver {
            promise: promise.clone(),
            latch: Arc::clone(&latch),
        },
        Rejecter {
            promise: promise.clone(),
            latch,
        },
    )
}

impl Resolver {
    /// Run the resolution procedure with `value`: adopt it if it is a promise
    /// or thenable, fulfill with it otherwise.
    pub fn resolve(&self, value: impl Into<Value>) {
        if self.latch.swap(true, Ordering::AcqRel) {
            tracing::trace!(promise = %self.promise.id(), "Ignoring repeated resolve");
            return;
        }
        resolve_promise(&self.promise, value.into());
    }

    pub(super) fn into_promise(self) -> Promise {
        self.promise
    }
}

impl Rejecter {
    pub fn reject(&self, reason: impl Into<Value>) {
        if self.latch.swap(true, Ordering::AcqRel) {
            tracing::trace!(promise = %self.promise.id(), "Ignoring repeated reject");
            return;
        }
        self.promise.settle(Settlement::Rejected {
            reason: reason.into(),
        });
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("promise", &self.promise.id())
            .field("used", &self.latch.load(Ordering::Acquire))
            .finish()
    }
}

impl fmt::Debug for Rejecter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejecter")
            .field("promise", &self.promise.id())
            .field("used", &self.latch.load(Ordering::Acquire))
            .finish()
    }
}

/// Settle `promise` according to `x`.
///
/// 1. `x` is `promise` itself: reject with a cycle `TypeError`.
/// 2. `x` is a native promise: follow its eventual state.
/// 3. `x` is a thenable: read its `then`; a raise rejects, a non-callable
///    member fulfills with `x`, otherwise call it with a fresh one-shot pair.
/// 4. Anything else fulfills.
pub(crate) fn resolve_promise(promise: &Promise, x: Value) {
    match x {
        Value::Promise(other) if other.ptr_eq(promise) => {
            tracing::debug!(promise = %promise.id(), "Chaining cycle detected");
            promise.settle(Settlement::Rejected {
                reason: ErrorValue::cycle().into(),
            });
        }
        Value::Promise(other) => {
            tracing::trace!(promise = %promise.id(), source = %other.id(), "Adopting promise");
            let (resolve, reject) = resolving_functions(promise);
            other.subscribe(Reaction::Adopt { resolve, reject });
        }
        Value::Thenable(thenable) => adopt_thenable(promise, thenable),
        value => {
            promise.settle(Settlement::Fulfilled { value });
        }
    }
}

fn adopt_thenable(promise: &Promise, thenable: Arc<dyn Thenable>) {
    match guard(|| thenable.then_is_callable()) {
        Err(reason) => {
            tracing::debug!(promise = %promise.id(), %reason, "Reading then raised");
            promise.settle(Settlement::Rejected { reason });
        }
        Ok(false) => {
            promise.settle(Settlement::Fulfilled {
                value: Value::Thenable(thenable),
            });
        }
        Ok(true) => {
            tracing::trace!(promise = %promise.id(), thenable = ?thenable, "Adopting thenable");
            let (resolve, reject) = resolving_functions(promise);
            let fallback = reject.clone();
            if let Err(reason) = guard(|| thenable.then(resolve, reject)) {
                // Ignored by the latch when a callback already fired.
                fallback.reject(reason);
            }
        }
    }
}
