//! Externally settled promises.
//!
//! A [Deferred] is a promise together with its [Resolver], for producers that
//! settle from somewhere other than an executor closure: an I/O completion
//! callback, a message handler, a test.
//!
//! A [Cancelable] goes one step further and is what a transport layer hands to
//! its callers: a promise that can be cancelled. Cancellation is not an engine
//! feature; [Cancelable::cancel] runs the producer's abort hook and then
//! rejects through the ordinary path.
//!
//! # Example
//!
//! ```
//! use vow::{task::Executor, Cancelable};
//! use std::{cell::Cell, rc::Rc};
//!
//! let aborted = Rc::new(Cell::new(false));
//! let request = {
//!     let aborted = aborted.clone();
//!     Cancelable::<String, String>::new(move || aborted.set(true))
//! };
//!
//! let handled = request.catch(|reason| Ok(format!("handled: {reason}")));
//!
//! request.cancel("aborted".to_string());
//! assert!(aborted.get());
//!
//! Executor::run();
//! assert_eq!(handled.outcome(), Some(Ok("handled: aborted".to_string())));
//! ```
use std::{cell::RefCell, ops::Deref, rc::Rc};

use log::debug;

use crate::{
    task::{Executor, Schedule},
    Promise, Resolution, Resolver,
};

/// A promise settled from the outside.
///
/// See the [module-level documentation](self) for more information.
pub struct Deferred<T, E> {
    promise: Promise<T, E>,
    resolver: Resolver<T, E>,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// A pending promise on this thread's [Executor].
    pub fn new() -> Self {
        Self::with_scheduler(Executor::handle())
    }

    pub fn with_scheduler(scheduler: Rc<dyn Schedule>) -> Self {
        let promise = Promise::pending(scheduler);
        let resolver = promise.resolver();

        Self { promise, resolver }
    }

    pub fn promise(&self) -> &Promise<T, E> {
        &self.promise
    }

    pub fn resolver(&self) -> Resolver<T, E> {
        self.resolver.clone()
    }

    pub fn into_promise(self) -> Promise<T, E> {
        self.promise
    }

    /// See [Resolver::resolve].
    pub fn resolve(&self, value: T) {
        self.resolver.resolve(value);
    }

    /// See [Resolver::resolve_with].
    pub fn resolve_with(&self, resolution: impl Into<Resolution<T, E>>) {
        self.resolver.resolve_with(resolution);
    }

    /// See [Resolver::reject].
    pub fn reject(&self, reason: E) {
        self.resolver.reject(reason);
    }
}

impl<T, E> Default for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A promise with a cancellation hook.
///
/// Dereferences to the underlying [Promise], so it can be chained like any
/// other.
pub struct Cancelable<T, E> {
    deferred: Deferred<T, E>,
    on_cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl<T, E> Cancelable<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// A pending cancelable promise on this thread's [Executor].
    pub fn new(on_cancel: impl FnOnce() + 'static) -> Self {
        Self::from_deferred(Deferred::new(), on_cancel)
    }

    pub fn from_deferred(deferred: Deferred<T, E>, on_cancel: impl FnOnce() + 'static) -> Self {
        Self {
            deferred,
            on_cancel: RefCell::new(Some(Box::new(on_cancel))),
        }
    }

    /// The producer side, for settling the promise normally.
    pub fn resolver(&self) -> Resolver<T, E> {
        self.deferred.resolver()
    }

    /// Run the cancellation hook, then reject with `reason`.
    ///
    /// The hook runs at most once across all calls. If the promise has already
    /// settled the rejection is a no-op, as with any late reject.
    pub fn cancel(&self, reason: E) {
        let hook = self.on_cancel.borrow_mut().take();

        if let Some(hook) = hook {
            debug!("cancelling");
            hook();
        }

        self.deferred.reject(reason);
    }

    pub fn into_promise(self) -> Promise<T, E> {
        self.deferred.into_promise()
    }
}

impl<T, E> Deref for Cancelable<T, E> {
    type Target = Promise<T, E>;

    fn deref(&self) -> &Self::Target {
        &self.deferred.promise
    }
}
