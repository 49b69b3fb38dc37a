//! Combinators over collections of values.
//!
//! Every input element is first normalized with [`Promise::resolve`], so
//! plain values, native promises and thenables can be mixed freely. Results
//! are written by input index, never by completion order.

use std::sync::{Arc, Mutex, PoisonError};

use crate::errors::ErrorValue;
use crate::scheduler::Scheduler;
use crate::value::Value;

use super::{Callback, Promise, Rejecter, Resolver, Settlement};

/// Index-addressed slots plus a countdown of unfilled ones.
struct Collector {
    slots: Vec<Option<Value>>,
    remaining: usize,
}

impl Collector {
    fn shared(len: usize) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            slots: vec![None; len],
            remaining: len,
        }))
    }

    /// Store `value` at `index`. Returns every slot, in index order, once the
    /// last one is filled.
    fn fill(collector: &Mutex<Self>, index: usize, value: Value) -> Option<Vec<Value>> {
        let mut this = collector.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = this.slots.get_mut(index)?;
        if slot.replace(value).is_some() {
            return None;
        }
        this.remaining -= 1;
        if this.remaining > 0 {
            return None;
        }
        Some(this.slots.drain(..).map(Option::unwrap_or_default).collect())
    }
}

/// Subscribe to every element of `values` with the callbacks produced by
/// `on_element`.
fn for_each_element<F>(scheduler: &Scheduler, values: Vec<Value>, mut on_element: F)
where
    F: FnMut(usize) -> (Callback, Callback),
{
    for (index, value) in values.into_iter().enumerate() {
        let (on_fulfilled, on_rejected) = on_element(index);
        Promise::resolve(scheduler, value).then(Some(on_fulfilled), Some(on_rejected));
    }
}

fn forward_resolve(resolve: &Resolver) -> Callback {
    let resolve = resolve.clone();
    Callback::new(move |value| {
        resolve.resolve(value);
        Ok(Value::Undefined)
    })
}

fn forward_reject(reject: &Rejecter) -> Callback {
    let reject = reject.clone();
    Callback::new(move |reason| {
        reject.reject(reason);
        Ok(Value::Undefined)
    })
}

impl Promise {
    /// Fulfills with every value, in input order, once all inputs fulfill.
    /// Rejects with the first rejection reason observed. An empty input
    /// fulfills with an empty array.
    pub fn all<I>(scheduler: &Scheduler, values: I) -> Promise
    where
        I: IntoIterator<Item = Value>,
    {
        let values: Vec<Value> = values.into_iter().collect();
        Promise::new(scheduler, move |resolve, reject| {
            if values.is_empty() {
                resolve.resolve(Value::Array(Vec::new()));
                return Ok(());
            }
            let collector = Collector::shared(values.len());
            for_each_element(scheduler, values, |index| {
                let collector = Arc::clone(&collector);
                let resolve = resolve.clone();
                let on_fulfilled = Callback::new(move |value| {
                    if let Some(results) = Collector::fill(&collector, index, value) {
                        resolve.resolve(Value::Array(results));
                    }
                    Ok(Value::Undefined)
                });
                (on_fulfilled, forward_reject(&reject))
            });
            Ok(())
        })
    }

    /// Fulfills, once every input has settled, with one status record per
    /// input in input order. Never rejects. An empty input fulfills with an
    /// empty array.
    pub fn all_settled<I>(scheduler: &Scheduler, values: I) -> Promise
    where
        I: IntoIterator<Item = Value>,
    {
        let values: Vec<Value> = values.into_iter().collect();
        Promise::new(scheduler, move |resolve, _reject| {
            if values.is_empty() {
                resolve.resolve(Value::Array(Vec::new()));
                return Ok(());
            }
            let collector = Collector::shared(values.len());
            for_each_element(scheduler, values, |index| {
                let record = |to_settlement: fn(Value) -> Settlement| {
                    let collector = Arc::clone(&collector);
                    let resolve = resolve.clone();
                    Callback::new(move |payload| {
                        let record = to_settlement(payload).into_record();
                        if let Some(records) = Collector::fill(&collector, index, record) {
                            resolve.resolve(Value::Array(records));
                        }
                        Ok(Value::Undefined)
                    })
                };
                (
                    record(|value| Settlement::Fulfilled { value }),
                    record(|reason| Settlement::Rejected { reason }),
                )
            });
            Ok(())
        })
    }

    /// Adopts the outcome of whichever input settles first. An empty input
    /// never settles.
    pub fn race<I>(scheduler: &Scheduler, values: I) -> Promise
    where
        I: IntoIterator<Item = Value>,
    {
        let values: Vec<Value> = values.into_iter().collect();
        Promise::new(scheduler, move |resolve, reject| {
            for_each_element(scheduler, values, |_| {
                (forward_resolve(&resolve), forward_reject(&reject))
            });
            Ok(())
        })
    }

    /// Fulfills with the first fulfillment value. Rejects once, with an
    /// `AggregateError` carrying every reason in input order, when all inputs
    /// reject. An empty input never settles.
    pub fn any<I>(scheduler: &Scheduler, values: I) -> Promise
    where
        I: IntoIterator<Item = Value>,
    {
        let values: Vec<Value> = values.into_iter().collect();
        Promise::new(scheduler, move |resolve, reject| {
            if values.is_empty() {
                tracing::debug!("any() over an empty input never settles");
                return Ok(());
            }
            let collector = Collector::shared(values.len());
            for_each_element(scheduler, values, |index| {
                let collector = Arc::clone(&collector);
                let reject = reject.clone();
                let on_rejected = Callback::new(move |reason| {
                    if let Some(reasons) = Collector::fill(&collector, index, reason) {
                        reject.reject(ErrorValue::aggregate(reasons));
                    }
                    Ok(Value::Undefined)
                });
                (forward_resolve(&resolve), on_rejected)
            });
            Ok(())
        })
    }
}
