//! Promises/A+ behaviors driven through the adapter surface

use aplus_core::{Adapter, Callback, ErrorKind, Promise, State, Value};

use crate::common::{EventLog, TestHost, fulfilled, rejected};

fn noop() -> Callback {
    Callback::new(|_| Ok(Value::Undefined))
}

fn logging(log: &EventLog, label: &'static str) -> Callback {
    let log = log.clone();
    Callback::new(move |payload| {
        log.push(format!("{label}:{payload}"));
        Ok(payload)
    })
}

// ── 2.1 states ──

#[test]
fn fulfilled_promise_cannot_be_rejected() {
    let host = TestHost::new();
    let d = host.scheduler.deferred();
    d.resolve("dummy");
    d.reject("other");
    host.drain();
    assert_eq!(d.promise().state(), fulfilled("dummy"));
}

#[test]
fn rejected_promise_cannot_be_fulfilled() {
    let host = TestHost::new();
    let d = host.scheduler.deferred();
    d.reject("dummy");
    d.resolve("other");
    let _ = d.promise().then(None, Some(noop()));
    host.drain();
    assert_eq!(d.promise().state(), rejected("dummy"));
}

// ── 2.2.2 / 2.2.3 callback timing ──

#[test]
fn callbacks_run_once_after_settlement() {
    let host = TestHost::new();
    let log = EventLog::default();
    let d = host.scheduler.deferred();
    let _ = d
        .promise()
        .then(Some(logging(&log, "ok")), Some(logging(&log, "err")));

    host.drain();
    assert!(log.events().is_empty());

    d.resolve("v");
    d.resolve("again");
    host.drain();
    host.drain();
    assert_eq!(log.events(), vec!["ok:v"]);
}

#[test]
fn rejection_callback_receives_the_reason() {
    let host = TestHost::new();
    let log = EventLog::default();
    let _ = host
        .scheduler
        .rejected(Value::from("why"))
        .then(Some(logging(&log, "ok")), Some(logging(&log, "err")));
    host.drain();
    assert_eq!(log.events(), vec!["err:why"]);
}

// ── 2.2.4 asynchrony ──

#[test]
fn then_on_settled_promise_returns_before_callback_runs() {
    let host = TestHost::new();
    let log = EventLog::default();
    let promise = host.scheduler.resolved(Value::from(1));

    let _ = promise.then(Some(logging(&log, "callback")), None);
    log.push("after then");
    host.drain();

    assert_eq!(log.events(), vec!["after then", "callback:1"]);
}

// ── 2.2.6 multiple registrations ──

#[test]
fn multiple_handlers_run_in_order_even_when_one_raises() {
    let host = TestHost::new();
    let log = EventLog::default();
    let d = host.scheduler.deferred();

    let _ = d.promise().then(Some(logging(&log, "first")), None);
    let raising = {
        let log = log.clone();
        d.promise().on_fulfilled(move |value| {
            log.push(format!("second:{value}"));
            Err(Value::from("second failed"))
        })
    };
    let _ = raising.catch(|_| Ok(Value::Undefined));
    let _ = d.promise().then(Some(logging(&log, "third")), None);

    d.resolve("x");
    host.drain();
    assert_eq!(log.events(), vec!["first:x", "second:x", "third:x"]);
}

#[test]
fn multiple_rejection_handlers_run_in_order() {
    let host = TestHost::new();
    let log = EventLog::default();
    let d = host.scheduler.deferred();
    for label in ["a", "b", "c"] {
        let _ = d.promise().then(None, Some(logging(&log, label)));
    }
    d.reject("r");
    host.drain();
    assert_eq!(log.events(), vec!["a:r", "b:r", "c:r"]);
}

// ── 2.2.7 then returns a promise ──

#[test]
fn then_returns_a_distinct_promise() {
    let host = TestHost::new();
    let promise = host.scheduler.resolved(Value::Undefined);
    let derived = promise.then(None, None);
    assert!(!derived.ptr_eq(&promise));
    assert!(derived.is_pending());
    host.drain();
    assert_eq!(derived.state(), fulfilled(()));
}

#[test]
fn returned_value_resolves_the_derived_promise() {
    let host = TestHost::new();
    let derived = host
        .scheduler
        .rejected(Value::from("handled"))
        .catch(|reason| Ok(Value::from(format!("recovered from {reason}"))));
    host.drain();
    assert_eq!(derived.state(), fulfilled("recovered from handled"));
}

#[test]
fn raised_error_rejects_the_derived_promise() {
    let host = TestHost::new();
    let derived = host
        .scheduler
        .resolved(Value::from(1))
        .on_fulfilled(|_| Err(Value::from("thrown")));
    let _ = derived.catch(|_| Ok(Value::Undefined));
    host.drain();
    assert_eq!(derived.state(), rejected("thrown"));
}

#[test]
fn non_callable_handlers_propagate() {
    let host = TestHost::new();
    let from_fulfilled = host.scheduler.resolved(Value::from("v")).catch(|_| {
        Ok(Value::from("should not run"))
    });
    let from_rejected = host
        .scheduler
        .rejected(Value::from("r"))
        .on_fulfilled(|_| Ok(Value::from("should not run")));
    let _ = from_rejected.catch(|_| Ok(Value::Undefined));
    host.drain();

    assert_eq!(from_fulfilled.state(), fulfilled("v"));
    assert_eq!(from_rejected.state(), rejected("r"));
}

#[test]
fn long_chains_propagate_through_passthrough_links() {
    let host = TestHost::new();
    let mut promise = host.scheduler.rejected(Value::from("deep"));
    for _ in 0..50 {
        promise = promise.then(None, None);
    }
    let recovered = promise.catch(Ok);
    host.drain();
    assert_eq!(recovered.state(), fulfilled("deep"));
}

// ── 2.3.1 cycles ──

#[test]
fn returning_the_derived_promise_itself_is_a_type_error() {
    let host = TestHost::new();
    let d = host.scheduler.deferred();
    let (promise, resolve, _reject) = d.into_parts();
    let handle = promise.clone();
    let derived = host.scheduler.resolved(Value::Undefined).on_fulfilled(move |_| {
        resolve.resolve(handle);
        Ok(Value::Undefined)
    });
    host.drain();

    assert_eq!(derived.state(), fulfilled(()));
    let state = promise.state();
    let State::Rejected(Value::Error(err)) = state else {
        panic!("expected a cycle error, got {state:?}");
    };
    assert_eq!(err.kind(), ErrorKind::TypeError);
    assert!(err.is_cycle());
}

// ── finally ──

#[test]
fn finally_observes_both_paths_without_changing_them() {
    let host = TestHost::new();
    let log = EventLog::default();
    let ok_log = log.clone();
    let err_log = log.clone();

    let ok = host.scheduler.resolved(Value::from(1)).finally(move || {
        ok_log.push("finally ok");
        Ok(Value::from("ignored"))
    });
    let err = host.scheduler.rejected(Value::from(2)).finally(move || {
        err_log.push("finally err");
        Ok(Value::Undefined)
    });
    let _ = err.catch(|_| Ok(Value::Undefined));
    host.drain();

    assert_eq!(log.events(), vec!["finally ok", "finally err"]);
    assert_eq!(ok.state(), fulfilled(1));
    assert_eq!(err.state(), rejected(2));
}

#[test]
fn promise_new_adopts_resolved_native_promise() {
    let host = TestHost::new();
    let inner = host.scheduler.resolved(Value::from("inner"));
    let outer = Promise::new(&host.scheduler, move |resolve, _| {
        resolve.resolve(inner);
        Ok(())
    });
    assert!(outer.is_pending());
    host.drain();
    assert_eq!(outer.state(), fulfilled("inner"));
}
