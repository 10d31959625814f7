use std::{cell::Cell, fmt, rc::Rc};

use log::trace;

use super::{Promise, Resolution};
use crate::Error;

/// The resolve/reject pair of a pending [Promise].
///
/// Executors passed to [Promise::new] receive one, as do thenables being
/// adopted. Resolvers are cheap to clone; whichever clone settles the promise
/// first wins and every later call is silently ignored.
///
/// A promise can never be settled with itself. The plain methods panic when
/// asked to, the `try_` variants return an [Error] instead; either way the
/// promise stays pending.
pub struct Resolver<T, E> {
    promise: Promise<T, E>,
    // Present for resolvers handed to a thenable: shared between all of them
    // so that only the first callback of that thenable is honoured.
    called: Option<Rc<Cell<bool>>>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            promise: self.promise.clone(),
            called: self.called.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("promise", &self.promise)
            .field("guarded", &self.called.is_some())
            .finish()
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    pub(crate) fn new(promise: Promise<T, E>) -> Self {
        Self {
            promise,
            called: None,
        }
    }

    pub(crate) fn guarded(promise: Promise<T, E>, called: Rc<Cell<bool>>) -> Self {
        Self {
            promise,
            called: Some(called),
        }
    }

    /// Resolve the promise with `value`.
    ///
    /// # Panics
    ///
    /// If `value` is a type-erased handle to this very promise.
    pub fn resolve(&self, value: T) {
        self.resolve_with(Resolution::Value(value));
    }

    /// Reject the promise with `reason`.
    ///
    /// # Panics
    ///
    /// If `reason` is a type-erased handle to this very promise.
    pub fn reject(&self, reason: E) {
        self.resolve_with(Resolution::Reject(reason));
    }

    /// Settle the promise with `resolution`, adopting the outcome of a
    /// promise or thenable.
    ///
    /// # Panics
    ///
    /// If `resolution` refers to this very promise.
    pub fn resolve_with(&self, resolution: impl Into<Resolution<T, E>>) {
        if let Err(e) = self.try_resolve_with(resolution) {
            panic!("{e}");
        }
    }

    /// [Resolver::reject], reporting self-rejection as an [Error].
    pub fn try_reject(&self, reason: E) -> Result<(), Error> {
        self.try_resolve_with(Resolution::Reject(reason))
    }

    /// [Resolver::resolve_with], reporting self-resolution as an [Error].
    pub fn try_resolve_with(&self, resolution: impl Into<Resolution<T, E>>) -> Result<(), Error> {
        let resolution = resolution.into();

        match &self.called {
            None => self.promise.lock_and_settle(resolution),
            Some(called) => {
                if called.get() {
                    trace!("thenable called back more than once, ignored");
                    return Ok(());
                }

                self.promise.check_not_self(&resolution)?;
                called.set(true);
                self.promise.settle_with(resolution);

                Ok(())
            }
        }
    }

    /// Whether the underlying promise has settled.
    pub fn is_settled(&self) -> bool {
        !self.promise.is_pending()
    }
}
