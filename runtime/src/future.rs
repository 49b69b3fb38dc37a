//! Awaiting promises from async Rust.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use aplus_core::{Callback, ErrorValue, Promise, Settlement, Value};
use thiserror::Error;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AwaitError {
    /// The promise, or the host that would have run its reactions, was
    /// dropped while the promise was still pending.
    #[error("promise was abandoned while pending")]
    Abandoned,
}

type Slot = Arc<Mutex<Option<oneshot::Sender<Settlement>>>>;

pub trait PromiseExt {
    /// Wait for the promise to settle.
    fn settled(&self) -> Settled;

    /// Wait for the promise to settle and return its value or reason.
    /// Abandonment surfaces as an `Error` reason.
    fn value(&self) -> SettledValue;
}

impl PromiseExt for Promise {
    fn settled(&self) -> Settled {
        let (settled_tx, settled_rx) = oneshot::channel();
        let slot: Slot = Arc::new(Mutex::new(Some(settled_tx)));
        let rejected_slot = Arc::clone(&slot);

        self.then(
            Some(Callback::new(move |value| {
                deliver(&slot, Settlement::Fulfilled { value });
                Ok(Value::Undefined)
            })),
            Some(Callback::new(move |reason| {
                deliver(&rejected_slot, Settlement::Rejected { reason });
                Ok(Value::Undefined)
            })),
        );

        Settled { settled_rx }
    }

    fn value(&self) -> SettledValue {
        SettledValue {
            settled: self.settled(),
        }
    }
}

/// Future returned by [`PromiseExt::settled`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct Settled {
    settled_rx: oneshot::Receiver<Settlement>,
}

impl Future for Settled {
    type Output = Result<Settlement, AwaitError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.settled_rx)
            .poll(cx)
            .map(|received| received.map_err(|_| AwaitError::Abandoned))
    }
}

/// Future returned by [`PromiseExt::value`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct SettledValue {
    settled: Settled,
}

impl Future for SettledValue {
    type Output = Result<Value, Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.settled).poll(cx).map(|settled| match settled {
            Ok(settlement) => settlement.into_result(),
            Err(err) => Err(ErrorValue::error(err.to_string()).into()),
        })
    }
}

fn deliver(slot: &Slot, settlement: Settlement) {
    let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(sender) = sender
        && sender.send(settlement).is_err()
    {
        tracing::trace!("Settlement receiver dropped before delivery");
    }
}
