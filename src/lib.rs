//! # Taskmill
//!
//! A task-execution substrate built from two cooperating engines:
//!
//! - [`ThreadPool`] — a fixed-but-resizable worker pool executing submitted
//!   tasks on dedicated OS threads, with support for *delayed* tasks gated
//!   by a timer completion;
//! - [`Scheduler`] — a time-based scheduler deferring tasks until an
//!   absolute monotonic deadline on a single dedicated thread.
//!
//! Both engines share the [`Task`] protocol (`execute`/`abandon`, exactly
//! one of which is invoked per accepted task) and the completion layer in
//! [`promise`], which models asynchronous results with continuations that
//! run on the settling thread.
//!
//! ## Modules
//!
//! - [`core`] - The two engines, the task protocol, and error types
//! - [`promise`] - One-shot completion signalling between threads
//! - [`config`] - serde-backed engine configuration
//! - [`builders`] - Constructing engines from configuration
//! - [`util`] - Telemetry helpers
//!
//! ## Examples
//!
//! ### Running work on the pool
//!
//! ```
//! use taskmill::{task, ThreadPool};
//!
//! let pool = ThreadPool::new(4).unwrap();
//! let (work, result) = task::with_result(|| 6 * 7);
//! pool.submit(work);
//! result.wait();
//! assert_eq!(result.value(), Some(42));
//! ```
//!
//! ### Deferring work with the scheduler
//!
//! ```
//! use std::time::{Duration, Instant};
//! use taskmill::{task, Scheduler};
//!
//! let scheduler = Scheduler::new().unwrap();
//! let (work, result) = task::with_result(|| "later");
//! scheduler.submit(work, Instant::now() + Duration::from_millis(5));
//! result.wait();
//! assert_eq!(result.value(), Some("later"));
//! ```
//!
//! ### Coupling the two: delayed pool submission
//!
//! ```
//! use std::time::{Duration, Instant};
//! use taskmill::{task, Scheduler, ThreadPool};
//!
//! let pool = ThreadPool::new(2).unwrap();
//! let scheduler = Scheduler::new().unwrap();
//!
//! let (work, result) = task::with_result(|| "delayed");
//! let timer = scheduler.timer(Instant::now() + Duration::from_millis(5));
//! pool.submit_delayed(work, timer);
//!
//! result.wait();
//! assert_eq!(result.value(), Some("delayed"));
//! ```

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod builders;
pub mod config;
pub mod core;
pub mod promise;
pub mod util;

// Re-export main types for convenience
pub use crate::core::task;
pub use crate::core::{PoolError, Scheduler, Task, ThreadPool};
pub use crate::promise::{Completion, Promise};
