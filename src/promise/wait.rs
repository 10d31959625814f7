use std::{
    cell::RefCell,
    future::{Future, IntoFuture},
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
};

use super::Promise;

/// A future that completes when a [Promise] settles.
///
/// Obtained through `IntoFuture`, i.e. by `.await`ing a promise. The promise
/// only settles when its scheduler is driven, so whatever polls this future
/// must also arrange for that.
pub struct Wait<T, E> {
    promise: Promise<T, E>,
    waker: Rc<RefCell<Option<Waker>>>,
    registered: bool,
}

impl<T, E> IntoFuture for Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = Wait<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        Wait {
            promise: self,
            waker: Rc::new(RefCell::new(None)),
            registered: false,
        }
    }
}

impl<T, E> Future for Wait<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(outcome) = this.promise.outcome() {
            return Poll::Ready(outcome);
        }

        *this.waker.borrow_mut() = Some(cx.waker().clone());

        if !this.registered {
            this.registered = true;
            let waker = this.waker.clone();

            this.promise.observe(move |_| {
                if let Some(waker) = waker.borrow_mut().take() {
                    waker.wake();
                }
            });
        }

        Poll::Pending
    }
}
