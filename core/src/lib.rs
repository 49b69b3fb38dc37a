//! Promises/A+ deferred values.
//!
//! This crate contains the runtime-agnostic core: the promise state machine,
//! the resolution procedure that adopts promises and foreign thenables, the
//! static combinators, and the [`Scheduler`] capability through which a host
//! runs reactions on a later turn. [`JobQueue`] is a deterministic host for
//! tests and embedders that own their loop.
//!
//! Async runtimes plug in by implementing [`Schedule`].

mod deferred;
pub mod errors;
mod ids;
mod promise;
mod scheduler;
mod thenable;
mod value;

pub use deferred::{Adapter, Deferred};
pub use errors::{ErrorKind, ErrorValue, QueueError};
pub use ids::PromiseId;
pub use promise::{Callback, Outcome, Promise, Rejecter, Resolver, Settlement, State};
pub use scheduler::{Job, JobQueue, Schedule, Scheduler, UnhandledRejections};
pub use thenable::Thenable;
pub use value::Value;
