//! all / all_settled / race / any over mixed inputs

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use aplus_core::{Adapter, Deferred, ErrorKind, Promise, State, Value};

use crate::common::{SyncThenable, TestHost, fulfilled, rejected};

fn array<const N: usize>(items: [Value; N]) -> Value {
    Value::Array(items.into())
}

#[test]
fn all_orders_results_by_input_not_completion() {
    let host = TestHost::new();
    let first = Deferred::new(&host.scheduler);
    let second = Deferred::new(&host.scheduler);
    let all = Promise::all(
        &host.scheduler,
        [first.promise().clone().into(), second.promise().clone().into()],
    );

    second.resolve("b");
    host.drain();
    assert!(all.is_pending());
    first.resolve("a");
    host.drain();

    assert_eq!(all.state(), fulfilled(array(["a".into(), "b".into()])));
}

#[test]
fn all_mixes_plain_values_promises_and_thenables() {
    let host = TestHost::new();
    let all = Promise::all(
        &host.scheduler,
        [
            Value::from(1),
            host.scheduler.resolved(Value::from(2)).into(),
            Value::thenable(SyncThenable(Value::from(3))),
        ],
    );
    host.drain();
    assert_eq!(all.state(), fulfilled(array([1.into(), 2.into(), 3.into()])));
}

#[test]
fn all_rejects_as_soon_as_one_input_rejects() {
    let host = TestHost::new();
    let never = Deferred::new(&host.scheduler);
    let all = Promise::all(
        &host.scheduler,
        [
            never.promise().clone().into(),
            host.scheduler.rejected(Value::from("x")).into(),
        ],
    );
    let _ = all.catch(|_| Ok(Value::Undefined));
    host.drain();
    assert_eq!(all.state(), rejected("x"));
}

#[test]
fn all_settled_waits_for_every_input() {
    let host = TestHost::new();
    let slow = Deferred::new(&host.scheduler);
    let settled = Promise::all_settled(
        &host.scheduler,
        [
            host.scheduler.rejected(Value::from("e")).into(),
            slow.promise().clone().into(),
        ],
    );
    host.drain();
    assert!(settled.is_pending());

    slow.resolve(1);
    host.drain();
    let State::Fulfilled(Value::Array(records)) = settled.state() else {
        panic!("expected an array of records");
    };
    assert_eq!(records[0].get("status"), Some(&Value::from("rejected")));
    assert_eq!(records[0].get("reason"), Some(&Value::from("e")));
    assert_eq!(records[1].get("status"), Some(&Value::from("fulfilled")));
    assert_eq!(records[1].get("value"), Some(&Value::from(1)));
}

#[test]
fn race_adopts_a_rejection_that_arrives_first() {
    let host = TestHost::new();
    let slow = Deferred::new(&host.scheduler);
    let race = Promise::race(
        &host.scheduler,
        [
            slow.promise().clone().into(),
            host.scheduler.rejected(Value::from("fast failure")).into(),
        ],
    );
    let _ = race.catch(|_| Ok(Value::Undefined));
    host.drain();
    slow.resolve("too slow");
    host.drain();
    assert_eq!(race.state(), rejected("fast failure"));
}

#[test]
fn any_ignores_rejections_once_something_fulfills() {
    let host = TestHost::new();
    let late = Deferred::new(&host.scheduler);
    let any = Promise::any(
        &host.scheduler,
        [
            host.scheduler.rejected(Value::from("a")).into(),
            late.promise().clone().into(),
        ],
    );
    host.drain();
    assert!(any.is_pending());

    late.resolve("winner");
    host.drain();
    assert_eq!(any.state(), fulfilled("winner"));
}

#[test]
fn any_rejects_exactly_once_with_every_reason() {
    let host = TestHost::new();
    let any = Promise::any(
        &host.scheduler,
        [
            host.scheduler.rejected(Value::from("a")).into(),
            host.scheduler.rejected(Value::from("b")).into(),
        ],
    );
    let reasons_seen = Arc::new(AtomicUsize::new(0));
    let counter = reasons_seen.clone();
    let _ = any.catch(move |reason| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(reason)
    });
    host.drain();

    let State::Rejected(Value::Error(err)) = any.state() else {
        panic!("expected an aggregate error");
    };
    assert_eq!(err.kind(), ErrorKind::AggregateError);
    assert_eq!(err.message(), "All promises were rejected");
    assert_eq!(err.errors(), &[Value::from("a"), Value::from("b")]);
    assert_eq!(reasons_seen.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_inputs() {
    let host = TestHost::new();
    let all = Promise::all(&host.scheduler, []);
    let all_settled = Promise::all_settled(&host.scheduler, []);
    let race = Promise::race(&host.scheduler, []);
    let any = Promise::any(&host.scheduler, []);
    host.drain();

    assert_eq!(all.state(), fulfilled(Value::Array(Vec::new())));
    assert_eq!(all_settled.state(), fulfilled(Value::Array(Vec::new())));
    assert!(race.is_pending());
    assert!(any.is_pending());
}
