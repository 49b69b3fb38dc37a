//! The deferred-value state machine.
//!
//! A [`Promise`] starts `Pending` and settles at most once, to `Fulfilled`
//! or `Rejected`. Settlement is a check-and-set of the state tag under the
//! promise's lock; every later attempt is ignored. Reactions registered
//! while pending are queued and handed to the [`Scheduler`] in registration
//! order on settlement; reactions registered afterwards are scheduled at
//! once. Both hand-offs happen under the lock, so a reaction registered on
//! another thread during settlement still queues behind the earlier ones.
//! No reaction ever runs inside the call that registered or triggered it,
//! and user code never runs while the lock is held.
//!
//! ```text
//!             settle(Fulfilled)
//!   Pending ───────────────────▶ Fulfilled(value)
//!      │
//!      └──────────────────────▶ Rejected(reason)
//!             settle(Rejected)
//! ```

mod combinators;
mod resolution;

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::errors::ErrorValue;
use crate::ids::PromiseId;
use crate::scheduler::{Scheduler, UnhandledRejections};
use crate::value::Value;

pub(crate) use resolution::{resolve_promise, resolving_functions};
pub use resolution::{Rejecter, Resolver};

/// What a callback, executor, or thenable produced: `Ok` to continue with a
/// value (which may itself be a promise or thenable), `Err` to raise.
pub type Outcome = Result<Value, Value>;

/// Run `f`, turning a panic into a raised `Panic` error value.
pub(crate) fn guard<T>(f: impl FnOnce() -> Result<T, Value>) -> Result<T, Value> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(ErrorValue::from_panic(payload.as_ref()).into()))
}

// ============================================================================
// State
// ============================================================================

/// Snapshot of a promise's state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum State {
    #[default]
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

impl State {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled(_) => "fulfilled",
            Self::Rejected(_) => "rejected",
        }
    }

    /// The terminal outcome, or `None` while pending.
    #[must_use]
    pub fn settlement(&self) -> Option<Settlement> {
        match self {
            Self::Pending => None,
            Self::Fulfilled(value) => Some(Settlement::Fulfilled {
                value: value.clone(),
            }),
            Self::Rejected(reason) => Some(Settlement::Rejected {
                reason: reason.clone(),
            }),
        }
    }
}

impl From<Settlement> for State {
    fn from(settlement: Settlement) -> Self {
        match settlement {
            Settlement::Fulfilled { value } => Self::Fulfilled(value),
            Settlement::Rejected { reason } => Self::Rejected(reason),
        }
    }
}

/// A terminal outcome. Serializes as the `allSettled` record shape:
/// `{"status": "fulfilled", "value": ..}` or `{"status": "rejected", "reason": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Settlement {
    Fulfilled { value: Value },
    Rejected { reason: Value },
}

impl Settlement {
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Fulfilled { .. } => "fulfilled",
            Self::Rejected { .. } => "rejected",
        }
    }

    #[must_use]
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled { .. })
    }

    /// The value or reason, without its tag.
    #[must_use]
    pub fn into_payload(self) -> Value {
        match self {
            Self::Fulfilled { value } => value,
            Self::Rejected { reason } => reason,
        }
    }

    pub fn into_result(self) -> Outcome {
        match self {
            Self::Fulfilled { value } => Ok(value),
            Self::Rejected { reason } => Err(reason),
        }
    }

    /// The outcome as a record value.
    #[must_use]
    pub fn into_record(self) -> Value {
        match self {
            Self::Fulfilled { value } => {
                Value::object([("status", Value::from("fulfilled")), ("value", value)])
            }
            Self::Rejected { reason } => {
                Value::object([("status", Value::from("rejected")), ("reason", reason)])
            }
        }
    }
}

// ============================================================================
// Reactions
// ============================================================================

/// A continuation registered through [`Promise::then`].
pub struct Callback(Box<dyn FnOnce(Value) -> Outcome + Send + 'static>);

impl Callback {
    pub fn new(f: impl FnOnce(Value) -> Outcome + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    fn invoke(self, payload: Value) -> Outcome {
        guard(move || (self.0)(payload))
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

#[derive(Debug)]
pub(crate) enum Reaction {
    /// Registered by `then`: run the eligible callback and resolve the
    /// downstream promise with its result.
    Then {
        on_fulfilled: Option<Callback>,
        on_rejected: Option<Callback>,
        downstream: Promise,
    },
    /// Registered by the resolution procedure when adopting a native promise.
    Adopt { resolve: Resolver, reject: Rejecter },
}

impl Reaction {
    fn run(self, settlement: Settlement) {
        match self {
            Self::Then {
                on_fulfilled,
                on_rejected,
                downstream,
            } => {
                let handler = if settlement.is_fulfilled() {
                    on_fulfilled
                } else {
                    on_rejected
                };
                let Some(callback) = handler else {
                    downstream.settle(settlement);
                    return;
                };
                match callback.invoke(settlement.into_payload()) {
                    Ok(value) => resolve_promise(&downstream, value),
                    Err(reason) => {
                        downstream.settle(Settlement::Rejected { reason });
                    }
                }
            }
            Self::Adopt { resolve, reject } => match settlement {
                Settlement::Fulfilled { value } => resolve.resolve(value),
                Settlement::Rejected { reason } => reject.reject(reason),
            },
        }
    }

    /// The promise this reaction would have settled.
    fn into_target(self) -> Promise {
        match self {
            Self::Then { downstream, .. } => downstream,
            Self::Adopt { resolve, reject } => {
                drop(reject);
                resolve.into_promise()
            }
        }
    }
}

// ============================================================================
// Promise
// ============================================================================

#[derive(Default)]
struct Inner {
    state: State,
    reactions: Vec<Reaction>,
    /// Set once any reaction has been registered.
    handled: bool,
}

struct Shared {
    id: PromiseId,
    scheduler: Scheduler,
    inner: Mutex<Inner>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !inner.handled
            && let State::Rejected(reason) = &inner.state
        {
            match self.scheduler.unhandled_rejections() {
                UnhandledRejections::Warn => {
                    tracing::warn!(promise = %self.id, %reason, "Rejected promise dropped without a handler");
                }
                UnhandledRejections::Debug => {
                    tracing::debug!(promise = %self.id, %reason, "Rejected promise dropped without a handler");
                }
                UnhandledRejections::Off => {}
            }
        }

        // A pending chain owns each next link through its reactions. Unlink
        // the links we hold the last handle to here, so dropping a long chain
        // does not recurse once per link.
        let mut detached = mem::take(&mut inner.reactions);
        while let Some(reaction) = detached.pop() {
            if let Some(mut next) = Arc::into_inner(reaction.into_target().shared) {
                let next_inner = next.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
                detached.append(&mut next_inner.reactions);
            }
        }
    }
}

/// A value that is available now, later, or never.
///
/// Cloning yields another handle to the same promise.
#[derive(Clone)]
pub struct Promise {
    shared: Arc<Shared>,
}

impl Promise {
    pub(crate) fn pending(scheduler: &Scheduler) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: PromiseId::next(),
                scheduler: scheduler.clone(),
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    /// Create a promise and run `executor` synchronously with its resolving
    /// functions.
    ///
    /// If the executor returns `Err` or panics before resolving, the promise
    /// is rejected with that reason.
    pub fn new<E>(scheduler: &Scheduler, executor: E) -> Self
    where
        E: FnOnce(Resolver, Rejecter) -> Result<(), Value>,
    {
        let promise = Self::pending(scheduler);
        let (resolve, reject) = resolving_functions(&promise);
        let fallback = reject.clone();
        if let Err(reason) = guard(move || executor(resolve, reject)) {
            tracing::debug!(promise = %promise.id(), %reason, "Executor raised");
            fallback.reject(reason);
        }
        promise
    }

    /// A promise resolved with `value`. A native promise is returned as is;
    /// thenables are adopted.
    pub fn resolve(scheduler: &Scheduler, value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Promise(promise) => promise,
            value => {
                let promise = Self::pending(scheduler);
                resolve_promise(&promise, value);
                promise
            }
        }
    }

    /// A promise already rejected with `reason`.
    pub fn reject(scheduler: &Scheduler, reason: impl Into<Value>) -> Self {
        let promise = Self::pending(scheduler);
        promise.settle(Settlement::Rejected {
            reason: reason.into(),
        });
        promise
    }

    /// Register continuations and return the promise for their result.
    ///
    /// Exactly one of the callbacks runs, on a later turn, chosen by how this
    /// promise settles. A missing callback passes the value or reason through
    /// unchanged.
    pub fn then(&self, on_fulfilled: Option<Callback>, on_rejected: Option<Callback>) -> Promise {
        let downstream = Self::pending(&self.shared.scheduler);
        self.subscribe(Reaction::Then {
            on_fulfilled,
            on_rejected,
            downstream: downstream.clone(),
        });
        downstream
    }

    /// Shorthand for `then(Some(f), None)`.
    pub fn on_fulfilled(&self, f: impl FnOnce(Value) -> Outcome + Send + 'static) -> Promise {
        self.then(Some(Callback::new(f)), None)
    }

    /// Shorthand for `then(None, Some(f))`.
    pub fn catch(&self, on_rejected: impl FnOnce(Value) -> Outcome + Send + 'static) -> Promise {
        self.then(None, Some(Callback::new(on_rejected)))
    }

    /// Run `on_finally` once whichever way this promise settles, then pass
    /// the original outcome through.
    ///
    /// If `on_finally` raises, or returns a promise that rejects, that
    /// rejection replaces the original outcome.
    pub fn finally<F>(&self, on_finally: F) -> Promise
    where
        F: FnOnce() -> Outcome + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Some(on_finally)));
        let fulfilled_slot = Arc::clone(&slot);
        let scheduler = self.shared.scheduler.clone();
        let rejected_scheduler = scheduler.clone();

        self.then(
            Some(Callback::new(move |value| {
                let result = run_finally(&fulfilled_slot)?;
                Ok(Promise::resolve(&scheduler, result)
                    .on_fulfilled(move |_| Ok(value))
                    .into())
            })),
            Some(Callback::new(move |reason| {
                let result = run_finally(&slot)?;
                Ok(Promise::resolve(&rejected_scheduler, result)
                    .on_fulfilled(move |_| Err(reason))
                    .into())
            })),
        )
    }

    #[must_use]
    pub fn id(&self) -> PromiseId {
        self.shared.id
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.shared.scheduler
    }

    /// Current state, without registering a reaction.
    #[must_use]
    pub fn state(&self) -> State {
        self.lock().state.clone()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.lock().state.is_pending()
    }

    /// Whether both handles refer to the same promise.
    #[must_use]
    pub fn ptr_eq(&self, other: &Promise) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Transition out of `Pending`. Returns `false`, changing nothing, if the
    /// promise had already settled.
    ///
    /// The drained reactions are scheduled before the lock is released.
    /// `Schedule::schedule` runs no user code, so this cannot re-enter.
    pub(crate) fn settle(&self, settlement: Settlement) -> bool {
        let mut inner = self.lock();
        if !inner.state.is_pending() {
            tracing::debug!(
                promise = %self.id(),
                attempted = settlement.status(),
                current = inner.state.as_str(),
                "Ignoring settlement of an already settled promise"
            );
            return false;
        }
        inner.state = State::from(settlement.clone());
        let reactions = mem::take(&mut inner.reactions);

        tracing::trace!(
            promise = %self.id(),
            status = settlement.status(),
            reactions = reactions.len(),
            "Settled"
        );
        for reaction in reactions {
            self.enqueue(reaction, settlement.clone());
        }
        true
    }

    pub(crate) fn subscribe(&self, reaction: Reaction) {
        let mut inner = self.lock();
        inner.handled = true;
        match inner.state.settlement() {
            Some(settlement) => self.enqueue(reaction, settlement),
            None => inner.reactions.push(reaction),
        }
    }

    fn enqueue(&self, reaction: Reaction, settlement: Settlement) {
        tracing::trace!(promise = %self.id(), status = settlement.status(), "Scheduling reaction");
        self.shared
            .scheduler
            .schedule(Box::new(move || reaction.run(settlement)));
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn run_finally<F>(slot: &Mutex<Option<F>>) -> Outcome
where
    F: FnOnce() -> Outcome,
{
    let on_finally = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    on_finally.map_or(Ok(Value::Undefined), |f| f())
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Promise")
            .field("id", &self.shared.id)
            .field("state", &inner.state.as_str())
            .field("reactions", &inner.reactions.len())
            .finish()
    }
}
