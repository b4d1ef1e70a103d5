//! The task protocol shared by both execution engines.
//!
//! Anything submittable implements [`Task`] and is handled as an
//! `Arc<dyn Task>`: the engine pins the handle from submission until it has
//! invoked exactly one of `execute` or `abandon`, then drops its reference.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::promise::{self, Completion, Promise};

/// A unit of work accepted by the worker pool or the scheduler.
///
/// Over the lifetime of a submission the owning engine calls exactly one of
/// the two methods, exactly once:
///
/// - [`execute`](Task::execute) when the engine decides to run the work;
/// - [`abandon`](Task::abandon) when the engine decides the work will never
///   run (cancellation via `clear` or engine shutdown).
///
/// Both calls happen outside all engine locks. Abandonment is not an error;
/// it is the normal terminal state for accepted-but-cancelled work, and
/// implementations typically resolve any associated result as cancelled.
pub trait Task: Send + Sync {
    /// Run the work.
    fn execute(&self);

    /// Notify the work it will never execute.
    fn abandon(&self);
}

/// Wrap a closure as a task whose abandonment is a silent drop.
///
/// # Examples
///
/// ```
/// use taskmill::core::task;
///
/// let work = task::from_fn(|| println!("running"));
/// work.execute();
/// ```
pub fn from_fn<F>(func: F) -> Arc<dyn Task>
where
    F: FnOnce() + Send + 'static,
{
    Arc::new(FnTask {
        func: Mutex::new(Some(func)),
    })
}

/// Wrap a closure as a task paired with a completion for its result.
///
/// Executing the task settles the completion with the closure's return
/// value; abandoning it cancels the completion. This is the pattern for
/// observing cancellation from outside an engine.
///
/// # Examples
///
/// ```
/// use taskmill::core::task;
///
/// let (work, result) = task::with_result(|| 2 + 2);
/// work.execute();
/// assert_eq!(result.value(), Some(4));
/// ```
pub fn with_result<T, F>(func: F) -> (Arc<dyn Task>, Completion<T>)
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (promise, completion) = promise::pair();
    let task = Arc::new(ResultTask {
        inner: Mutex::new(Some((func, promise))),
    });
    (task, completion)
}

struct FnTask<F> {
    func: Mutex<Option<F>>,
}

impl<F> Task for FnTask<F>
where
    F: FnOnce() + Send,
{
    fn execute(&self) {
        if let Some(func) = self.func.lock().take() {
            func();
        }
    }

    fn abandon(&self) {
        self.func.lock().take();
    }
}

struct ResultTask<T, F> {
    inner: Mutex<Option<(F, Promise<T>)>>,
}

impl<T, F> Task for ResultTask<T, F>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send,
{
    fn execute(&self) {
        if let Some((func, promise)) = self.inner.lock().take() {
            promise.set(func());
        }
    }

    fn abandon(&self) {
        if let Some((_, promise)) = self.inner.lock().take() {
            promise.cancel();
        }
    }
}

/// Execute a task, containing any panic it raises.
///
/// A panicking task counts as completed; the failure belongs to the
/// submitter and the engine thread carries on.
pub(crate) fn run(task: &Arc<dyn Task>) {
    if panic::catch_unwind(AssertUnwindSafe(|| task.execute())).is_err() {
        warn!("task panicked during execute");
    }
}

/// Abandon a task, containing any panic it raises.
pub(crate) fn abandon(task: &Arc<dyn Task>) {
    if panic::catch_unwind(AssertUnwindSafe(|| task.abandon())).is_err() {
        warn!("task panicked during abandon");
    }
}
