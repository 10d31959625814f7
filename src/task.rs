//! Task scheduling and execution
//!
//! Promises never run their callbacks inside the call that settled them or
//! subscribed to them. Instead, every settlement hands a [Task] to a
//! [Schedule] implementation, and the callbacks run later when that scheduler
//! is driven. This module provides the scheduling capability and two
//! strategies for it:
//!
//! 1. [Executor], a per-thread run queue. This is what [Promise::new] and the
//!    other convenience constructors use. Each OS thread has its own queue and
//!    needs to call [Executor::run] (or [Executor::block_on]) to make
//!    progress.
//! 2. [TickPump], an owned queue that is only drained when you ask it to. Use
//!    it for deterministic tests or to embed promises into a foreign event
//!    loop.
//!
//! # Example
//!
//! ```
//! use vow::{task::Executor, Promise};
//! let p = Promise::<i32, String>::resolve(2).then(|v| Ok(v * 21));
//! assert_eq!(p.outcome(), None);
//! Executor::run();
//! assert_eq!(p.outcome(), Some(Ok(42)));
//! ```
//!
//! Using [Executor::block_on] to wait for a single promise:
//!
//! ```
//! use vow::{task::Executor, Promise};
//! let p = Promise::<&str, String>::resolve("hello");
//! assert_eq!(Executor::block_on(&p), Some(Ok("hello")));
//! ```
//!
//! # Threading Model
//!
//! Promises are built on `Rc` and cannot leave the thread that created them.
//! Settling happens on the spot, but the callbacks of a promise created on a
//! thread are only run by that thread's [Executor]. Driving another thread's
//! queue does nothing for them:
//!
//! ```
//! use vow::{task::Executor, Promise};
//! use std::thread;
//!
//! let p = Promise::<i32, String>::resolve(1).then(Ok);
//!
//! let other = thread::spawn(|| {
//!     let q = Promise::<i32, String>::resolve(2).then(Ok);
//!     Executor::run();
//!     q.outcome()
//! });
//!
//! assert_eq!(other.join().unwrap(), Some(Ok(2)));
//! assert_eq!(p.outcome(), None);
//! Executor::run();
//! assert_eq!(p.outcome(), Some(Ok(1)));
//! ```
//!
//! [Promise::new]: crate::Promise::new
use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use log::trace;

use crate::Promise;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// The capability to run a [Task] later.
///
/// Implementations must not run the task synchronously inside
/// [Schedule::schedule], and must run tasks in the order they were scheduled.
pub trait Schedule {
    fn schedule(&self, task: Task);
}

#[derive(Default)]
struct RunQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl RunQueue {
    const fn new() -> Self {
        Self {
            tasks: RefCell::new(VecDeque::new()),
        }
    }

    fn push(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }

    fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    fn tick(&self) -> bool {
        // Released before running: the task may schedule more work.
        let task = self.tasks.borrow_mut().pop_front();

        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    fn run(&self) -> usize {
        let mut ran = 0;

        while self.tick() {
            ran += 1;
        }

        trace!("run queue idle after {ran} task(s)");

        ran
    }

    fn block_on<T, E>(&self, promise: &Promise<T, E>) -> Option<Result<T, E>>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        while promise.is_pending() {
            if !self.tick() {
                trace!("run queue drained with promise still pending");
                break;
            }
        }

        promise.outcome()
    }
}

thread_local! {
    static EXEC: RunQueue = const { RunQueue::new() };
}

/// The per-thread scheduler.
///
/// A zero-sized handle onto the calling thread's run queue. Scheduling through
/// it only queues work; nothing runs until [Executor::run], [Executor::tick]
/// or [Executor::block_on] is called on the same thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Executor;

impl Schedule for Executor {
    fn schedule(&self, task: Task) {
        EXEC.with(|exec| exec.push(task));
    }
}

impl Executor {
    /// A shareable scheduler handle for this thread's run queue.
    pub fn handle() -> Rc<dyn Schedule> {
        Rc::new(Executor)
    }

    /// Run every queued task, including those queued while running, until the
    /// queue is empty. Returns the number of tasks that ran.
    pub fn run() -> usize {
        EXEC.with(RunQueue::run)
    }

    /// Run the oldest queued task, if any. Returns `false` when the queue was
    /// empty.
    pub fn tick() -> bool {
        EXEC.with(RunQueue::tick)
    }

    /// The number of tasks waiting in this thread's queue.
    pub fn pending() -> usize {
        EXEC.with(RunQueue::len)
    }

    /// Drive this thread's queue until `promise` settles and return its
    /// outcome.
    ///
    /// Returns `None` if the queue runs dry while the promise is still
    /// pending, i.e. nothing scheduled on this thread can ever settle it.
    pub fn block_on<T, E>(promise: &Promise<T, E>) -> Option<Result<T, E>>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        EXEC.with(|exec| exec.block_on(promise))
    }
}

/// A manually driven scheduler.
///
/// Tasks queue up until [TickPump::tick] or [TickPump::run] is called, which
/// makes it possible to step through delivery one tick at a time.
///
/// ```
/// use vow::{task::TickPump, Promise};
///
/// let pump = TickPump::new();
/// let p = Promise::<i32, String>::with_scheduler(pump.clone(), |r| {
///     r.resolve(7);
///     Ok(())
/// })
/// .then(|v| Ok(v + 1));
///
/// assert!(p.is_pending());
/// assert_eq!(pump.block_on(&p), Some(Ok(8)));
/// ```
#[derive(Default)]
pub struct TickPump {
    queue: RunQueue,
}

impl Schedule for TickPump {
    fn schedule(&self, task: Task) {
        self.queue.push(task);
    }
}

impl TickPump {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn tick(&self) -> bool {
        self.queue.tick()
    }

    pub fn run(&self) -> usize {
        self.queue.run()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn block_on<T, E>(&self, promise: &Promise<T, E>) -> Option<Result<T, E>>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        self.queue.block_on(promise)
    }
}
