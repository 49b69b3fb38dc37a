//! Hosting aplus promises on tokio.
//!
//! - [`TokioScheduler`]: runs promise reactions on a driver task
//! - [`PromiseExt`]: awaits a promise from async code
//! - [`Host`]: builds a scheduler from [`AplusConfig`](aplus_config::AplusConfig)
//! - [`init_tracing`]: installs the log subscriber

mod future;
mod host;
mod logging;
mod tokio_scheduler;

pub use future::{AwaitError, PromiseExt, Settled, SettledValue};
pub use host::{Host, HostError};
pub use logging::{LOG_ENV, init_tracing, init_tracing_from_config};
pub use tokio_scheduler::TokioScheduler;
