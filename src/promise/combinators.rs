use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use log::trace;

use super::{Promise, Resolution};
use crate::task::Executor;

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Wait for every promise in `promises`.
    ///
    /// The returned promise resolves with the values in input order, not in
    /// completion order. It rejects as soon as any input rejects, with that
    /// input's reason; everything settling afterwards is ignored. An empty
    /// input resolves with an empty `Vec`.
    ///
    /// ```
    /// use vow::{task::Executor, Deferred, Promise};
    ///
    /// let slow = Deferred::<i32, String>::new();
    /// let all = Promise::all([slow.promise().clone(), Promise::resolve(2)]);
    ///
    /// Executor::run();
    /// assert!(all.is_pending());
    ///
    /// slow.resolve(1);
    /// assert_eq!(Executor::block_on(&all), Some(Ok(vec![1, 2])));
    /// ```
    pub fn all<I>(promises: I) -> Promise<Vec<T>, E>
    where
        I: IntoIterator<Item = Promise<T, E>>,
    {
        let promises: Vec<_> = promises.into_iter().collect();
        let scheduler = promises
            .first()
            .map_or_else(Executor::handle, Promise::scheduler);

        Promise::with_scheduler(scheduler, |resolver| {
            let total = promises.len();

            if total == 0 {
                resolver.resolve(Vec::new());
                return Ok(());
            }

            let slots = Rc::new(RefCell::new(vec![None; total]));
            let remaining = Rc::new(Cell::new(total));

            for (idx, promise) in promises.iter().enumerate() {
                let slots = slots.clone();
                let remaining = remaining.clone();
                let resolver = resolver.clone();

                promise.observe(move |outcome| match outcome {
                    Ok(v) => {
                        slots.borrow_mut()[idx] = Some(v);
                        remaining.set(remaining.get() - 1);

                        if remaining.get() == 0 {
                            let values = slots.take().into_iter().flatten().collect();
                            resolver.resolve(values);
                        }
                    }
                    Err(e) => {
                        trace!("all: input {idx} rejected");
                        resolver.reject(e);
                    }
                });
            }

            Ok(())
        })
    }

    /// [Promise::all] over a fixed number of promises, resolving with an array.
    ///
    /// Arrays implement [Spread](super::Spread), so the values can be handed
    /// to a callback as separate arguments:
    ///
    /// ```
    /// use vow::{task::Executor, Promise};
    ///
    /// let sum = Promise::<i32, String>::all_array([Promise::resolve(1), Promise::resolve(2)])
    ///     .spread(|a: i32, b: i32| Ok(a + b));
    ///
    /// assert_eq!(Executor::block_on(&sum), Some(Ok(3)));
    /// ```
    pub fn all_array<const N: usize>(promises: [Promise<T, E>; N]) -> Promise<[T; N], E> {
        Promise::all(promises).then_with(|values| match <[T; N]>::try_from(values) {
            Ok(values) => Resolution::Value(values),
            Err(values) => unreachable!("{} values gathered for {N} promises", values.len()),
        })
    }

    /// Settle with whichever promise in `promises` settles first, resolved or
    /// rejected.
    ///
    /// An empty input never settles.
    pub fn race<I>(promises: I) -> Promise<T, E>
    where
        I: IntoIterator<Item = Promise<T, E>>,
    {
        let promises: Vec<_> = promises.into_iter().collect();
        let scheduler = promises
            .first()
            .map_or_else(Executor::handle, Promise::scheduler);

        Promise::with_scheduler(scheduler, |resolver| {
            for promise in &promises {
                let resolver = resolver.clone();

                promise.observe(move |outcome| match outcome {
                    Ok(v) => resolver.resolve(v),
                    Err(e) => resolver.reject(e),
                });
            }

            Ok(())
        })
    }

    /// Wait for this promise and `other`, resolving with both values as a
    /// pair. Rejects with the first rejection, like [Promise::all].
    ///
    /// ```
    /// use vow::{task::Executor, Promise};
    ///
    /// let p = Promise::<u8, String>::resolve(2)
    ///     .join(&Promise::resolve("ab"))
    ///     .spread(|n: u8, s: &str| Ok(s.repeat(n.into())));
    ///
    /// assert_eq!(Executor::block_on(&p), Some(Ok("abab".to_string())));
    /// ```
    pub fn join<U>(&self, other: &Promise<U, E>) -> Promise<(T, U), E>
    where
        U: Clone + 'static,
    {
        let slots: Rc<RefCell<(Option<T>, Option<U>)>> = Rc::new(RefCell::new((None, None)));

        Promise::with_scheduler(self.scheduler(), |resolver| {
            let complete = {
                let slots = slots.clone();
                let resolver = resolver.clone();

                move || {
                    let pair = match &*slots.borrow() {
                        (Some(a), Some(b)) => Some((T::clone(a), U::clone(b))),
                        _ => None,
                    };

                    if let Some(pair) = pair {
                        resolver.resolve(pair);
                    }
                }
            };

            {
                let slots = slots.clone();
                let resolver = resolver.clone();
                let complete = complete.clone();

                self.observe(move |outcome| match outcome {
                    Ok(v) => {
                        slots.borrow_mut().0 = Some(v);
                        complete();
                    }
                    Err(e) => resolver.reject(e),
                });
            }

            other.observe(move |outcome| match outcome {
                Ok(v) => {
                    slots.borrow_mut().1 = Some(v);
                    complete();
                }
                Err(e) => resolver.reject(e),
            });

            Ok(())
        })
    }
}
