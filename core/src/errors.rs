//! Error payloads and infrastructure errors.
//!
//! Rejection reasons are ordinary [`Value`]s. The error kinds synthesized by
//! the promise machinery itself (cycle detection, `any` aggregation, caught
//! panics) are carried by [`ErrorValue`] so callers can match on them.

use std::any::Any;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::value::Value;

pub(crate) const CYCLE_MESSAGE: &str = "Chaining cycle detected for promise";
pub(crate) const AGGREGATE_MESSAGE: &str = "All promises were rejected";
const OPAQUE_PANIC_MESSAGE: &str = "callback panicked";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Error,
    TypeError,
    AggregateError,
    /// A Rust panic caught at a promise boundary.
    Panic,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::TypeError => "TypeError",
            Self::AggregateError => "AggregateError",
            Self::Panic => "Panic",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured error usable as a rejection reason.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{kind}: {message}")]
pub struct ErrorValue {
    kind: ErrorKind,
    message: String,
    /// Inner reasons of an `AggregateError`, in input order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<Value>,
}

impl ErrorValue {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Error, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    #[must_use]
    pub fn aggregate(errors: Vec<Value>) -> Self {
        Self {
            kind: ErrorKind::AggregateError,
            message: AGGREGATE_MESSAGE.to_string(),
            errors,
        }
    }

    #[must_use]
    pub(crate) fn cycle() -> Self {
        Self::type_error(CYCLE_MESSAGE)
    }

    /// Convert a caught panic payload into a rejection reason.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| OPAQUE_PANIC_MESSAGE.to_string());
        Self::new(ErrorKind::Panic, message)
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn errors(&self) -> &[Value] {
        &self.errors
    }

    #[must_use]
    pub fn is_cycle(&self) -> bool {
        self.kind == ErrorKind::TypeError && self.message == CYCLE_MESSAGE
    }
}

/// Failure to drain a [`JobQueue`](crate::JobQueue).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("drain budget of {budget} jobs exhausted with {pending} job(s) still queued")]
    BudgetExhausted { budget: usize, pending: usize },
}
