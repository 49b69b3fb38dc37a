//! The capability that makes a foreign object adoptable.
//!
//! Any type can take part in promise resolution by implementing [`Thenable`]
//! and being wrapped in [`Value::Thenable`](crate::Value::Thenable). The
//! resolution procedure is the only caller of these methods; nothing else in
//! the crate inspects a value for the capability.

use std::fmt;

use crate::promise::{Rejecter, Resolver};
use crate::value::Value;

/// An object exposing a continuation-registration operation.
///
/// Implementations are untrusted: they may call `resolve`/`reject` any
/// number of times, in any order, synchronously or later from another
/// thread. Only the first call has an effect.
pub trait Thenable: Send + Sync + fmt::Debug + 'static {
    /// Read the object's `then` member.
    ///
    /// `Ok(false)` means the member is absent or not callable, in which case
    /// the object itself becomes the fulfillment value. An `Err` is the reason
    /// raised while reading it.
    fn then_is_callable(&self) -> Result<bool, Value> {
        Ok(true)
    }

    /// Register the two one-shot settlement callbacks.
    ///
    /// Returning `Err` (or panicking) rejects the adopting promise unless one
    /// of the callbacks already fired.
    fn then(&self, resolve: Resolver, reject: Rejecter) -> Result<(), Value>;
}
