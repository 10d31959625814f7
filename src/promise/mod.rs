//! The promise engine.
//!
//! A [Promise] is a handle to a value that is not available yet. It starts out
//! [State::Pending] and settles exactly once, either resolved with a value of
//! type `T` or rejected with a reason of type `E`. Consumers subscribe with
//! [Promise::then] and friends; every subscription yields a new downstream
//! promise that settles with whatever the callback produced.
//!
//! Callbacks never run synchronously. Settling a promise, or subscribing to
//! one that has already settled, schedules a delivery tick on the promise's
//! [Schedule](crate::task::Schedule) implementation and returns immediately.
//! On that tick every queued subscriber is notified in the order it was
//! registered.
//!
//! Failures are ordinary values: a callback returning `Err(reason)` rejects
//! its downstream promise, and rejections pass unchanged through any
//! subscription that has no rejection handler until something like
//! [Promise::catch] consumes them.
//!
//! # Example
//!
//! ```
//! use vow::{task::Executor, Promise};
//!
//! let p = Promise::<i32, String>::resolve(1)
//!     .then(|v| Ok(v + 1))
//!     .then(|_| Err::<i32, _>("boom".to_string()))
//!     .catch(|reason| Ok(reason.len() as i32));
//!
//! Executor::run();
//! assert_eq!(p.outcome(), Some(Ok(4)));
//! ```
//!
//! The sub-modules hold the pieces built around the state machine:
//!
//! - `resolver`: the [Resolver] handle handed to executors and thenables.
//! - `thenable`: [Resolution] and the [Thenable] trait used for adoption.
//! - `spread`: positional-argument application for [Promise::spread].
//! - `combinators`: [Promise::all], [Promise::race] and [Promise::join].
//! - `wait`: `.await` support through [IntoFuture](std::future::IntoFuture).
use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    rc::Rc,
    thread,
};

use log::{debug, error, trace};

use crate::{
    task::{Executor, Schedule},
    Error,
};

mod combinators;
mod resolver;
mod spread;
mod thenable;
mod wait;

pub use resolver::Resolver;
pub use spread::Spread;
pub use thenable::{from_fn, FromFn, Resolution, Thenable};
pub use wait::Wait;

/// The observable state of a [Promise].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Resolved,
    Rejected,
}

enum Outcome<T, E> {
    Pending,
    Resolved(T),
    Rejected(E),
}

type Subscriber<T, E> = Box<dyn FnOnce(Result<T, E>)>;

struct Inner<T, E> {
    outcome: Outcome<T, E>,
    // Set by the first accepted resolve/reject; stays set while a thenable is
    // being adopted even though the outcome is still pending.
    locked: bool,
    subscribers: VecDeque<Subscriber<T, E>>,
}

/// A value of type `T` (or a rejection of type `E`) that will be available
/// later.
///
/// Cloning a `Promise` clones the handle, not the computation: all clones
/// observe the same settlement.
///
/// See the [module-level documentation](self) for more information.
pub struct Promise<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
    scheduler: Rc<dyn Schedule>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .finish()
    }
}

impl<T, E> Promise<T, E> {
    /// Returns `true` if both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn state(&self) -> State {
        match self.inner.borrow().outcome {
            Outcome::Pending => State::Pending,
            Outcome::Resolved(_) => State::Resolved,
            Outcome::Rejected(_) => State::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Create a promise on this thread's [Executor] and run `executor`
    /// synchronously with its [Resolver].
    ///
    /// If `executor` returns `Err(reason)` the promise is rejected with
    /// `reason`, unless a resolve or reject call was already accepted.
    ///
    /// ```
    /// use vow::{task::Executor, Promise};
    ///
    /// let p = Promise::<u8, String>::new(|r| {
    ///     r.resolve(1);
    ///     r.resolve(2);
    ///     Ok(())
    /// });
    ///
    /// assert_eq!(Executor::block_on(&p), Some(Ok(1)));
    /// ```
    pub fn new<F>(executor: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        Self::with_scheduler(Executor::handle(), executor)
    }

    /// Like [Promise::new], but deliveries for this promise and everything
    /// derived from it go through `scheduler`.
    pub fn with_scheduler<F>(scheduler: Rc<dyn Schedule>, executor: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        let promise = Self::pending(scheduler);

        if let Err(reason) = executor(promise.resolver()) {
            debug!("executor failed, rejecting");
            if let Err(e) = promise.lock_and_settle(Resolution::Reject(reason)) {
                error!("executor failure not applied: {e}");
            }
        }

        promise
    }

    /// A promise already resolved with `value`.
    pub fn resolve(value: T) -> Self {
        Self::new(|r| {
            r.resolve(value);
            Ok(())
        })
    }

    /// A promise already rejected with `reason`.
    pub fn reject(reason: E) -> Self {
        Self::new(|_| Err(reason))
    }

    pub(crate) fn pending(scheduler: Rc<dyn Schedule>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                outcome: Outcome::Pending,
                locked: false,
                subscribers: VecDeque::new(),
            })),
            scheduler,
        }
    }

    pub(crate) fn resolver(&self) -> Resolver<T, E> {
        Resolver::new(self.clone())
    }

    pub(crate) fn scheduler(&self) -> Rc<dyn Schedule> {
        self.scheduler.clone()
    }

    /// The settled value or reason, or `None` while pending.
    pub fn outcome(&self) -> Option<Result<T, E>> {
        match &self.inner.borrow().outcome {
            Outcome::Pending => None,
            Outcome::Resolved(v) => Some(Ok(v.clone())),
            Outcome::Rejected(e) => Some(Err(e.clone())),
        }
    }

    /// Subscribe to the value of this promise.
    ///
    /// Returns a promise that settles with the result of `on_resolved`. If this
    /// promise is rejected, `on_resolved` is never called and the rejection
    /// passes through to the returned promise.
    pub fn then<U, F>(&self, on_resolved: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<U, E> + 'static,
    {
        self.react(move |outcome| match outcome {
            Ok(v) => Resolution::from(on_resolved(v)),
            Err(e) => Resolution::Reject(e),
        })
    }

    /// Like [Promise::then], but `on_resolved` may hand back another promise
    /// or thenable whose outcome the returned promise adopts.
    ///
    /// ```
    /// use vow::{task::Executor, Promise, Resolution};
    ///
    /// let p = Promise::<i32, String>::resolve(2)
    ///     .then_with(|v| Resolution::from(Promise::resolve(v * 10)));
    ///
    /// assert_eq!(Executor::block_on(&p), Some(Ok(20)));
    /// ```
    pub fn then_with<U, F>(&self, on_resolved: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Resolution<U, E> + 'static,
    {
        self.react(move |outcome| match outcome {
            Ok(v) => on_resolved(v),
            Err(e) => Resolution::Reject(e),
        })
    }

    /// Subscribe with a handler for each outcome. The returned promise settles
    /// with the result of whichever handler runs.
    pub fn then_or_else<U, F, G>(&self, on_resolved: F, on_rejected: G) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<U, E> + 'static,
        G: FnOnce(E) -> Result<U, E> + 'static,
    {
        self.react(move |outcome| match outcome {
            Ok(v) => Resolution::from(on_resolved(v)),
            Err(e) => Resolution::from(on_rejected(e)),
        })
    }

    /// Subscribe to the rejection of this promise. Values pass through.
    pub fn catch<G>(&self, on_rejected: G) -> Promise<T, E>
    where
        G: FnOnce(E) -> Result<T, E> + 'static,
    {
        self.react(move |outcome| match outcome {
            Ok(v) => Resolution::Value(v),
            Err(e) => Resolution::from(on_rejected(e)),
        })
    }

    /// Like [Promise::catch], but `on_rejected` may hand back a promise or
    /// thenable to recover with.
    pub fn catch_with<G>(&self, on_rejected: G) -> Promise<T, E>
    where
        G: FnOnce(E) -> Resolution<T, E> + 'static,
    {
        self.react(move |outcome| match outcome {
            Ok(v) => Resolution::Value(v),
            Err(e) => on_rejected(e),
        })
    }

    /// Run `on_settled` once this promise settles, whichever way.
    ///
    /// Whatever `on_settled` returns is discarded, an `Err` included. The
    /// returned promise settles exactly like this one.
    pub fn finally<F, R>(&self, on_settled: F) -> Promise<T, E>
    where
        F: FnOnce() -> R + 'static,
    {
        self.react(move |outcome| {
            let _ = on_settled();

            match outcome {
                Ok(v) => Resolution::Value(v),
                Err(e) => Resolution::Reject(e),
            }
        })
    }

    /// For a promise of a tuple or array, call `on_fulfilled` with the elements
    /// as separate arguments.
    ///
    /// ```
    /// use vow::{task::Executor, Promise};
    ///
    /// let p = Promise::<(i32, &str), String>::resolve((3, "abc"))
    ///     .spread(|n: i32, s: &str| Ok(s.repeat(n as usize)));
    ///
    /// assert_eq!(Executor::block_on(&p), Some(Ok("abcabcabc".to_string())));
    /// ```
    pub fn spread<U, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: 'static,
        T: Spread<F, Output = Result<U, E>>,
    {
        self.then(move |args| args.spread(on_fulfilled))
    }

    /// [Promise::spread] with a rejection handler.
    pub fn spread_or_else<U, F, G>(&self, on_fulfilled: F, on_rejected: G) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: 'static,
        G: FnOnce(E) -> Result<U, E> + 'static,
        T: Spread<F, Output = Result<U, E>>,
    {
        self.then_or_else(move |args| args.spread(on_fulfilled), on_rejected)
    }

    /// Register `observer` to receive the outcome on a delivery tick, without
    /// creating a downstream promise.
    pub fn observe<F>(&self, observer: F)
    where
        F: FnOnce(Result<T, E>) + 'static,
    {
        self.enqueue(Box::new(observer));
    }

    fn react<U, F>(&self, reaction: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(Result<T, E>) -> Resolution<U, E> + 'static,
    {
        let downstream = Promise::pending(self.scheduler.clone());
        let resolver = downstream.resolver();

        self.enqueue(Box::new(move |outcome| {
            if let Err(e) = resolver.try_resolve_with(reaction(outcome)) {
                error!("callback result discarded, downstream left pending: {e}");
            }
        }));

        downstream
    }

    fn enqueue(&self, subscriber: Subscriber<T, E>) {
        let settled = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.push_back(subscriber);
            !matches!(inner.outcome, Outcome::Pending)
        };

        if settled {
            self.notify();
        }
    }

    /// Entry point for resolve/reject calls that are subject to the
    /// first-call-wins lock.
    pub(crate) fn lock_and_settle(&self, resolution: Resolution<T, E>) -> Result<(), Error> {
        if self.inner.borrow().locked {
            return Ok(());
        }

        self.check_not_self(&resolution)?;
        self.inner.borrow_mut().locked = true;
        self.settle_with(resolution);

        Ok(())
    }

    /// Apply `resolution` without looking at the lock. Used once the caller has
    /// already won the right to settle this promise.
    pub(crate) fn settle_with(&self, resolution: Resolution<T, E>) {
        match resolution {
            Resolution::Value(v) => self.settle(Outcome::Resolved(v)),
            Resolution::Reject(e) => self.settle(Outcome::Rejected(e)),
            Resolution::Promise(p) => self.adopt(Box::new(p)),
            Resolution::Thenable(t) => self.adopt(t),
        }
    }

    pub(crate) fn check_not_self(&self, resolution: &Resolution<T, E>) -> Result<(), Error> {
        let is_self = match resolution {
            Resolution::Value(v) => self.is_referenced_by(v),
            Resolution::Reject(e) => self.is_referenced_by(e),
            Resolution::Promise(p) => p.ptr_eq(self),
            Resolution::Thenable(_) => false,
        };

        match (is_self, resolution) {
            (false, _) => Ok(()),
            (true, Resolution::Reject(_)) => Err(Error::RejectedWithItself),
            (true, _) => Err(Error::ResolvedWithItself),
        }
    }

    fn is_referenced_by(&self, candidate: &dyn Any) -> bool {
        if let Some(p) = candidate.downcast_ref::<Promise<T, E>>() {
            p.ptr_eq(self)
        } else if let Some(b) = candidate.downcast_ref::<Box<dyn Any>>() {
            self.is_referenced_by(&**b)
        } else if let Some(r) = candidate.downcast_ref::<Rc<dyn Any>>() {
            self.is_referenced_by(&**r)
        } else {
            false
        }
    }

    fn adopt(&self, thenable: Box<dyn Thenable<T, E>>) {
        if !self.is_pending() {
            return;
        }

        debug!("adopting thenable");

        let called = Rc::new(Cell::new(false));

        if let Err(reason) = thenable.then(Resolver::guarded(self.clone(), called.clone())) {
            if !called.replace(true) {
                self.settle(Outcome::Rejected(reason));
            } else {
                trace!("thenable failed after settling, ignored");
            }
        }
    }

    fn settle(&self, outcome: Outcome<T, E>) {
        {
            let mut inner = self.inner.borrow_mut();

            if !matches!(inner.outcome, Outcome::Pending) {
                return;
            }

            inner.locked = true;
            inner.outcome = outcome;
        }

        trace!("settled as {:?}", self.state());
        self.notify();
    }

    fn notify(&self) {
        let this = self.clone();
        self.scheduler.schedule(Box::new(move || this.deliver()));
    }

    fn deliver(&self) {
        let _rearm = Rearm(self);
        let mut delivered = 0;

        loop {
            // The borrow ends before the subscriber runs so that it can
            // subscribe to or inspect this promise.
            let (subscriber, outcome) = {
                let mut inner = self.inner.borrow_mut();

                if inner.subscribers.is_empty() {
                    break;
                }

                let outcome = match &inner.outcome {
                    Outcome::Pending => break,
                    Outcome::Resolved(v) => Ok(v.clone()),
                    Outcome::Rejected(e) => Err(e.clone()),
                };

                let Some(subscriber) = inner.subscribers.pop_front() else {
                    break;
                };

                (subscriber, outcome)
            };

            subscriber(outcome);
            delivered += 1;
        }

        if delivered > 0 {
            trace!("delivered to {delivered} subscriber(s)");
        }
    }
}

/// Re-arms delivery if a subscriber panics, so that the subscribers queued
/// behind it are still notified once the host recovers.
struct Rearm<'a, T, E>(&'a Promise<T, E>)
where
    T: Clone + 'static,
    E: Clone + 'static;

impl<T, E> Drop for Rearm<'_, T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }

        let queued = match self.0.inner.try_borrow() {
            Ok(inner) => inner.subscribers.len(),
            Err(_) => return,
        };

        if queued > 0 {
            debug!("subscriber panicked, re-arming delivery for {queued} more");
            self.0.notify();
        }
    }
}

#[cfg(test)]
mod tests;
