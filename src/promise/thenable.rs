use super::{Promise, Resolver};

/// What a promise is resolved with.
///
/// Resolving with a [Resolution::Promise] or [Resolution::Thenable] does not
/// settle immediately: the promise adopts the eventual outcome of the other
/// object instead.
pub enum Resolution<T, E> {
    Value(T),
    Reject(E),
    Promise(Promise<T, E>),
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T, E> From<Result<T, E>> for Resolution<T, E> {
    fn from(value: Result<T, E>) -> Self {
        match value {
            Ok(v) => Self::Value(v),
            Err(e) => Self::Reject(e),
        }
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(value: Promise<T, E>) -> Self {
        Self::Promise(value)
    }
}

impl<T, E> Resolution<T, E> {
    /// Adopt the outcome of an arbitrary [Thenable].
    pub fn adopt(thenable: impl Thenable<T, E>) -> Self {
        Self::Thenable(Box::new(thenable))
    }
}

/// Something that eventually produces a value or a rejection, and can report
/// it through a [Resolver].
///
/// This is how foreign promise-like objects are adopted. The engine calls
/// [Thenable::then] once, synchronously, with a resolver for the adopting
/// promise. Implementations may call the resolver any number of times, now or
/// later; only the first call counts. Returning `Err(reason)` rejects the
/// adopting promise, unless the resolver was already called.
///
/// # Panics
///
/// Resolving the adopting promise with itself through [Resolver::resolve_with]
/// panics, as it does outside adoption. The engine has no way to build an `E`
/// describing the fault. A thenable that wants a rejection instead can use
/// [Resolver::try_resolve_with] and turn the [Error](crate::Error) into its own
/// reason; the resolver stays uncalled, so returning `Err` rejects.
///
/// ```
/// use vow::{task::Executor, Promise, Resolution, Resolver, Thenable};
///
/// struct Twice;
///
/// impl Thenable<u32, String> for Twice {
///     fn then(self: Box<Self>, resolver: Resolver<u32, String>) -> Result<(), String> {
///         resolver.resolve(1);
///         resolver.resolve(2);
///         Err("ignored".to_string())
///     }
/// }
///
/// let p = Promise::<u32, String>::new(|r| {
///     r.resolve_with(Resolution::adopt(Twice));
///     Ok(())
/// });
///
/// assert_eq!(Executor::block_on(&p), Some(Ok(1)));
/// ```
pub trait Thenable<T, E>: 'static {
    fn then(self: Box<Self>, resolver: Resolver<T, E>) -> Result<(), E>;
}

impl<T, E> Thenable<T, E> for Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn then(self: Box<Self>, resolver: Resolver<T, E>) -> Result<(), E> {
        self.observe(move |outcome| match outcome {
            Ok(v) => resolver.resolve(v),
            Err(e) => resolver.reject(e),
        });

        Ok(())
    }
}

/// A [Thenable] built from a closure. See [from_fn].
pub struct FromFn<F>(F);

/// Turn a closure into a [Thenable].
///
/// ```
/// use vow::{from_fn, task::Executor, Promise, Resolution};
///
/// let p = Promise::<&str, String>::resolve("ready").then_with(|v| {
///     Resolution::adopt(from_fn(move |r| {
///         r.resolve(v.len());
///         Ok(())
///     }))
/// });
///
/// assert_eq!(Executor::block_on(&p), Some(Ok(5)));
/// ```
pub fn from_fn<T, E, F>(f: F) -> FromFn<F>
where
    F: FnOnce(Resolver<T, E>) -> Result<(), E> + 'static,
{
    FromFn(f)
}

impl<T, E, F> Thenable<T, E> for FromFn<F>
where
    F: FnOnce(Resolver<T, E>) -> Result<(), E> + 'static,
{
    fn then(self: Box<Self>, resolver: Resolver<T, E>) -> Result<(), E> {
        (self.0)(resolver)
    }
}
