//! # `vow`: single-threaded promises
//!
//! This crate implements promises in the Promise/A+ style: handles to values
//! that are not available yet, which can be chained, combined and adopted from
//! other promise-like objects. A promise settles exactly once, and callbacks
//! attached to it always run on a later scheduler tick, never inside the call
//! that settled or subscribed to it.
//!
//! Scheduling is pluggable. By default every thread has its own run queue,
//! driven by [task::Executor::run]; a manually stepped [task::TickPump] is
//! available for tests or for embedding into another event loop.
//!
//! For the promise type and its operations, refer to the [promise] module. For
//! scheduling, see the [task] module. Producers that settle promises from the
//! outside should look at [deferred].
//!
//! ## Example
//!
//! ```
//! use vow::{task::Executor, Promise};
//!
//! let answer = Promise::<i32, String>::resolve(1)
//!     .then(|v| Ok(v + 1))
//!     .then(|_| Err::<i32, _>("boom".to_string()))
//!     .catch(|reason| Ok(reason.len() as i32 * 10))
//!     .finally(|| println!("settled"));
//!
//! Executor::run();
//! assert_eq!(answer.outcome(), Some(Ok(40)));
//! ```
pub mod deferred;
mod error;
pub mod promise;
pub mod task;

pub use deferred::{Cancelable, Deferred};
pub use error::Error;
pub use promise::{from_fn, Promise, Resolution, Resolver, Spread, State, Thenable};
