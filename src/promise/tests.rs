use std::{
    cell::{Cell, RefCell},
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use anyhow::Result;

use super::{from_fn, Promise, Resolution, Resolver, State, Thenable};
use crate::{
    task::{Executor, TickPump},
    Deferred, Error,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn settles_once() {
    init_logging();
    let d = Deferred::<i32, String>::new();

    d.resolve(1);
    d.resolve(2);
    d.reject("late".to_string());

    assert_eq!(d.promise().state(), State::Resolved);
    Executor::run();
    d.reject("later".to_string());
    assert_eq!(d.promise().outcome(), Some(Ok(1)));
}

#[test]
fn executor_error_rejects() {
    let p = Promise::<i32, String>::new(|_| Err("executor failed".to_string()));

    assert_eq!(p.state(), State::Rejected);
    assert_eq!(
        Executor::block_on(&p),
        Some(Err("executor failed".to_string()))
    );
}

#[test]
fn executor_error_after_resolve_is_ignored() {
    let p = Promise::<i32, String>::new(|r| {
        r.resolve(5);
        Err("too late".to_string())
    });

    assert_eq!(Executor::block_on(&p), Some(Ok(5)));
}

#[test]
fn executor_that_never_settles_stays_pending() {
    let p = Promise::<i32, String>::new(|_| Ok(()));

    assert_eq!(Executor::block_on(&p), None);
    assert!(p.is_pending());
}

#[test]
fn self_resolution_is_refused_and_stays_pending() {
    let d = Deferred::<i32, String>::new();

    assert_eq!(
        d.resolver().try_resolve_with(d.promise().clone()),
        Err(Error::ResolvedWithItself)
    );
    assert_eq!(d.promise().state(), State::Pending);

    d.resolve(3);
    assert_eq!(Executor::block_on(d.promise()), Some(Ok(3)));
}

#[test]
fn callbacks_never_run_synchronously() {
    let ran = Rc::new(Cell::new(false));
    let p = Promise::<i32, String>::resolve(1);

    {
        let ran = ran.clone();
        p.then(move |v| {
            ran.set(true);
            Ok(v)
        });
    }

    assert!(!ran.get());
    Executor::run();
    assert!(ran.get());
}

#[test]
fn nothing_delivered_while_pending() {
    let d = Deferred::<i32, String>::new();
    let ran = Rc::new(Cell::new(false));

    {
        let ran = ran.clone();
        d.promise().observe(move |_| ran.set(true));
    }

    assert_eq!(Executor::run(), 0);
    assert!(!ran.get());
}

#[test]
fn subscribers_run_in_registration_order() {
    let d = Deferred::<&str, String>::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    for name in ["s1", "s2", "s3"] {
        let order = order.clone();
        d.promise().then(move |v| {
            order.borrow_mut().push(format!("{name}:{v}"));
            Ok(())
        });
    }

    d.resolve("x");
    Executor::run();

    assert_eq!(*order.borrow(), vec!["s1:x", "s2:x", "s3:x"]);
}

#[test]
fn whole_queue_drains_in_one_tick() {
    let pump = TickPump::new();
    let d = Deferred::<i32, String>::with_scheduler(pump.clone());
    let count = Rc::new(Cell::new(0));

    for _ in 0..3 {
        let count = count.clone();
        d.promise().observe(move |_| count.set(count.get() + 1));
    }

    d.resolve(1);
    assert_eq!(pump.pending(), 1);
    assert!(pump.tick());
    assert_eq!(count.get(), 3);
}

#[test]
fn late_subscription_is_delivered_on_next_tick() {
    let p = Promise::<i32, String>::resolve(7);
    Executor::run();

    let seen = Rc::new(RefCell::new(None));
    {
        let seen = seen.clone();
        p.observe(move |outcome| *seen.borrow_mut() = Some(outcome));
    }

    assert_eq!(*seen.borrow(), None);
    Executor::run();
    assert_eq!(*seen.borrow(), Some(Ok(7)));
}

#[test]
fn failing_subscriber_does_not_affect_siblings() {
    let d = Deferred::<i32, String>::new();

    let failed = d.promise().then(|_| Err::<i32, _>("bad".to_string()));
    let fine = d.promise().then(|v| Ok(v + 1));

    d.resolve(1);
    Executor::run();

    assert_eq!(failed.outcome(), Some(Err("bad".to_string())));
    assert_eq!(fine.outcome(), Some(Ok(2)));
    assert_eq!(d.promise().outcome(), Some(Ok(1)));
}

#[test]
fn panicking_subscriber_leaves_siblings_deliverable() {
    let pump = TickPump::new();
    let d = Deferred::<i32, String>::with_scheduler(pump.clone());

    let _panicking = d
        .promise()
        .then(|_| -> Result<i32, String> { panic!("subscriber blew up") });
    let sibling = d.promise().then(|v| Ok(v + 1));

    d.resolve(1);
    let ran = panic::catch_unwind(AssertUnwindSafe(|| pump.run()));

    assert!(ran.is_err());
    assert_eq!(sibling.outcome(), None);
    assert_eq!(pump.pending(), 1);

    pump.run();
    assert_eq!(sibling.outcome(), Some(Ok(2)));
}

#[test]
fn rejection_passes_through_uninstrumented_chain() {
    let p = Promise::<i32, String>::reject("deep".to_string())
        .then(|v| Ok(v + 1))
        .then(|v| Ok(v.to_string()))
        .finally(|| ());

    assert_eq!(Executor::block_on(&p), Some(Err("deep".to_string())));
}

#[test]
fn value_passes_through_catch() {
    let p = Promise::<i32, String>::resolve(4).catch(|_| Ok(0));

    assert_eq!(Executor::block_on(&p), Some(Ok(4)));
}

#[test]
fn scenario_throw_then_catch_message() {
    let p = Promise::<i32, String>::resolve(1)
        .then(|v| Ok(v + 1))
        .then(|_| Err::<i32, _>("boom".to_string()))
        .then_or_else(|v| Ok(v.to_string()), Ok);

    assert_eq!(Executor::block_on(&p), Some(Ok("boom".to_string())));
}

#[test]
fn scenario_throw_then_catch_returns_reason() {
    let p = Promise::<String, String>::resolve("1".to_string())
        .then(|v| Ok(format!("{v}+1")))
        .then(|_| Err::<String, _>("boom".to_string()))
        .catch(|e| Ok(e));

    assert_eq!(Executor::block_on(&p), Some(Ok("boom".to_string())));
}

#[test]
fn scenario_reject_then_uppercase() {
    let p = Promise::<String, String>::reject("r".to_string()).catch(|r| Ok(r.to_uppercase()));

    assert_eq!(Executor::block_on(&p), Some(Ok("R".to_string())));
}

#[test]
fn finally_runs_on_both_paths_and_keeps_outcome() {
    let calls = Rc::new(Cell::new(0));

    let ok = {
        let calls = calls.clone();
        Promise::<i32, String>::resolve(1).finally(move || {
            calls.set(calls.get() + 1);
            Err::<(), _>("hook failed")
        })
    };
    let err = {
        let calls = calls.clone();
        Promise::<i32, String>::reject("reason".to_string()).finally(move || {
            calls.set(calls.get() + 1);
            Err::<(), _>("hook failed")
        })
    };

    Executor::run();

    assert_eq!(calls.get(), 2);
    assert_eq!(ok.outcome(), Some(Ok(1)));
    assert_eq!(err.outcome(), Some(Err("reason".to_string())));
}

#[test]
fn callback_returning_promise_is_adopted() {
    let inner = Deferred::<i32, String>::new();
    let p = {
        let inner = inner.promise().clone();
        Promise::<i32, String>::resolve(1).then_with(move |_| Resolution::Promise(inner))
    };

    Executor::run();
    assert!(p.is_pending());

    inner.resolve(10);
    assert_eq!(Executor::block_on(&p), Some(Ok(10)));
}

#[test]
fn catch_with_recovers_through_another_promise() {
    let p = Promise::<i32, String>::reject("x".to_string())
        .catch_with(|reason| Resolution::Promise(Promise::resolve(reason.len() as i32)));

    assert_eq!(Executor::block_on(&p), Some(Ok(1)));
}

#[test]
fn callback_resolving_its_own_downstream_stays_pending() {
    let slot: Rc<RefCell<Option<Promise<i32, String>>>> = Rc::new(RefCell::new(None));
    let d = Deferred::<i32, String>::new();

    let downstream = {
        let slot = slot.clone();
        d.promise().then_with(move |_| match slot.borrow_mut().take() {
            Some(own) => Resolution::Promise(own),
            None => Resolution::Value(0),
        })
    };
    *slot.borrow_mut() = Some(downstream.clone());
    let sibling = d.promise().then(|v| Ok(v * 3));

    d.resolve(2);
    Executor::run();

    assert!(downstream.is_pending());
    assert_eq!(sibling.outcome(), Some(Ok(6)));
}

struct CallsBackTwice {
    first: Result<u32, String>,
}

impl Thenable<u32, String> for CallsBackTwice {
    fn then(self: Box<Self>, resolver: Resolver<u32, String>) -> Result<(), String> {
        match self.first {
            Ok(v) => resolver.resolve(v),
            Err(e) => resolver.reject(e),
        }
        resolver.resolve(1000);
        resolver.reject("second".to_string());

        Ok(())
    }
}

#[test]
fn thenable_first_callback_wins() -> Result<()> {
    let resolved = Promise::<u32, String>::new(|r| {
        r.resolve_with(Resolution::adopt(CallsBackTwice { first: Ok(1) }));
        Ok(())
    });
    let rejected = Promise::<u32, String>::new(|r| {
        r.resolve_with(Resolution::adopt(CallsBackTwice {
            first: Err("first".to_string()),
        }));
        Ok(())
    });

    Executor::run();

    assert_eq!(resolved.outcome(), Some(Ok(1)));
    assert_eq!(rejected.outcome(), Some(Err("first".to_string())));

    Ok(())
}

#[test]
fn thenable_failing_before_calling_back_rejects() {
    let p = Promise::<u32, String>::new(|r| {
        r.resolve_with(Resolution::adopt(from_fn(|_: Resolver<u32, String>| {
            Err("no then".to_string())
        })));
        Ok(())
    });

    assert_eq!(Executor::block_on(&p), Some(Err("no then".to_string())));
}

#[test]
fn thenable_calling_back_later_is_adopted() {
    let stash: Rc<RefCell<Option<Resolver<u32, String>>>> = Rc::new(RefCell::new(None));

    let p = {
        let stash = stash.clone();
        Promise::<u32, String>::new(move |r| {
            r.resolve_with(Resolution::adopt(from_fn(move |inner| {
                *stash.borrow_mut() = Some(inner);
                Ok(())
            })));
            Ok(())
        })
    };

    assert_eq!(Executor::run(), 0);
    assert!(p.is_pending());

    let inner = stash.borrow_mut().take();
    if let Some(inner) = inner {
        inner.resolve(8);
        inner.reject("ignored".to_string());
    }

    assert_eq!(Executor::block_on(&p), Some(Ok(8)));
}

#[test]
fn nested_thenables_are_unwrapped() {
    let p = Promise::<u32, String>::new(|r| {
        r.resolve_with(Resolution::adopt(from_fn(|outer: Resolver<u32, String>| {
            outer.resolve_with(Promise::<u32, String>::resolve(4).then(|v| Ok(v * v)));
            Ok(())
        })));
        Ok(())
    });

    assert_eq!(Executor::block_on(&p), Some(Ok(16)));
}

#[test]
#[should_panic(expected = "promise resolved with itself")]
fn thenable_resolving_adopter_with_itself_panics() {
    let d = Deferred::<u32, String>::new();
    let adopter = d.promise().clone();

    d.resolve_with(Resolution::adopt(from_fn(move |r: Resolver<u32, String>| {
        r.resolve_with(adopter);
        Ok(())
    })));
}

#[test]
fn thenable_can_turn_self_resolution_into_rejection() {
    let d = Deferred::<u32, String>::new();
    let adopter = d.promise().clone();

    d.resolve_with(Resolution::adopt(from_fn(move |r: Resolver<u32, String>| {
        r.try_resolve_with(adopter).map_err(|e| e.to_string())
    })));

    assert_eq!(
        Executor::block_on(d.promise()),
        Some(Err("promise resolved with itself".to_string()))
    );
}

#[test]
fn spread_passes_positional_arguments() {
    let p = Promise::<(i32, i32, i32), String>::resolve((1, 2, 3))
        .spread(|a: i32, b: i32, c: i32| Ok(a * 100 + b * 10 + c));

    assert_eq!(Executor::block_on(&p), Some(Ok(123)));
}

#[test]
fn spread_or_else_handles_rejection() {
    let p = Promise::<[i32; 2], String>::reject("none".to_string())
        .spread_or_else(|a: i32, b: i32| Ok(a + b), |_| Ok(-1));

    assert_eq!(Executor::block_on(&p), Some(Ok(-1)));
}

#[test]
fn extra_members_do_not_disturb_the_engine() {
    struct Tagged {
        promise: Promise<i32, String>,
        tag: &'static str,
    }

    let tagged = Tagged {
        promise: Promise::resolve(1),
        tag: "request-1",
    };
    let p = tagged.promise.then(|v| Ok(v + 1));

    assert_eq!(tagged.tag, "request-1");
    assert_eq!(Executor::block_on(&p), Some(Ok(2)));
}

#[test]
fn debug_shows_state() {
    let p = Promise::<i32, String>::reject("x".to_string());
    assert_eq!(format!("{p:?}"), "Promise { state: Rejected }");
}
