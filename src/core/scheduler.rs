//! Deadline scheduler executing tasks on a single dedicated timer thread.
//!
//! A [`Scheduler`] keeps a min-heap of tasks keyed by absolute
//! monotonic-clock deadline. The timer thread sleeps until the earliest
//! deadline, executes every passed entry, and re-sleeps; submitting an
//! earlier deadline wakes it immediately.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use taskmill::{task, Scheduler};
//!
//! let scheduler = Scheduler::new().unwrap();
//! let (work, result) = task::with_result(|| "fired");
//! scheduler.submit(work, Instant::now() + Duration::from_millis(10));
//! result.wait();
//! assert_eq!(result.value(), Some("fired"));
//! ```

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::config::SchedulerConfig;
use crate::core::error::PoolError;
use crate::core::task::{self, Task};
use crate::promise::Completion;

/// A heap entry: a task and the instant it becomes eligible.
struct Entry {
    deadline: Instant,
    /// Submission sequence number; breaks deadline ties deterministically.
    seq: u64,
    task: Arc<dyn Task>,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap pops the greatest element; reverse both keys so the
        // earliest deadline (then earliest submission) surfaces first.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Entry {}

#[derive(Default)]
struct SchedState {
    queue: BinaryHeap<Entry>,
    next_seq: u64,
    stopped: bool,
}

struct SchedShared {
    state: Mutex<SchedState>,
    /// Signalled on new submissions, `clear`, and shutdown.
    newdata: Condvar,
}

impl SchedShared {
    fn run(&self) {
        loop {
            self.run_due();

            let mut state = self.state.lock();
            if state.stopped {
                return;
            }
            match state.queue.peek().map(|entry| entry.deadline) {
                Some(deadline) => {
                    let _ = self.newdata.wait_until(&mut state, deadline);
                }
                None => self.newdata.wait(&mut state),
            }
        }
    }

    /// Pop and execute every entry whose deadline has passed.
    ///
    /// Tasks run outside the lock; the heap is re-examined after each one.
    fn run_due(&self) {
        let now = Instant::now();
        loop {
            let task = {
                let mut state = self.state.lock();
                let due = state
                    .queue
                    .peek()
                    .is_some_and(|entry| entry.deadline <= now);
                if !due {
                    return;
                }
                let Some(entry) = state.queue.pop() else {
                    return;
                };
                entry.task
            };
            task::run(&task);
        }
    }
}

/// A time-based scheduler with one dedicated execution thread.
///
/// Tasks fire in non-decreasing deadline order; ties fire in submission
/// order. A deadline at or before `Instant::now()` is legal and executes on
/// the next loop iteration. Destruction abandons every pending task and
/// joins the thread.
pub struct Scheduler {
    shared: Arc<SchedShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if the timer thread cannot be started.
    pub fn new() -> Result<Self, PoolError> {
        Self::with_config(&SchedulerConfig::default())
    }

    /// Create a scheduler from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] for a rejected configuration or
    /// [`PoolError::Spawn`] if the timer thread cannot be started.
    pub fn with_config(config: &SchedulerConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;
        let shared = Arc::new(SchedShared {
            state: Mutex::new(SchedState::default()),
            newdata: Condvar::new(),
        });

        let thread = thread::Builder::new()
            .name(format!("{}-timer", config.thread_name_prefix))
            .stack_size(config.thread_stack_size)
            .spawn({
                let shared = Arc::clone(&shared);
                move || shared.run()
            })?;

        Ok(Self {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Schedule `task` to execute at `deadline`.
    pub fn submit(&self, task: Arc<dyn Task>, deadline: Instant) {
        let mut state = self.shared.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(Entry {
            deadline,
            seq,
            task,
        });
        drop(state);
        self.shared.newdata.notify_one();
    }

    /// A completion that settles when `deadline` passes.
    ///
    /// Cancelled (settled without a value) if the scheduler is cleared or
    /// dropped first. Suitable as the timer argument of
    /// [`ThreadPool::submit_delayed`](crate::ThreadPool::submit_delayed).
    pub fn timer(&self, deadline: Instant) -> Completion<()> {
        let (task, completion) = task::with_result(|| ());
        self.submit(task, deadline);
        completion
    }

    /// Number of tasks waiting for their deadline.
    pub fn len(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Whether no tasks are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Abandon every pending task without stopping the timer thread.
    pub fn clear(&self) {
        let drained = {
            let mut state = self.shared.state.lock();
            std::mem::take(&mut state.queue)
        };
        for entry in drained {
            task::abandon(&entry.task);
        }
        self.shared.newdata.notify_one();
    }
}

impl Drop for Scheduler {
    /// Abandon all pending tasks and join the timer thread.
    fn drop(&mut self) {
        let drained = {
            let mut state = self.shared.state.lock();
            state.stopped = true;
            std::mem::take(&mut state.queue)
        };
        for entry in drained {
            task::abandon(&entry.task);
        }
        self.shared.newdata.notify_one();

        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                warn!("scheduler thread terminated by panic");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_past_deadline_executes() {
        let scheduler = Scheduler::new().unwrap();
        let (work, result) = task::with_result(|| 1);
        scheduler.submit(work, Instant::now() - Duration::from_millis(5));
        result.wait();
        assert_eq!(result.value(), Some(1));
    }

    #[test]
    fn test_len_counts_pending() {
        let scheduler = Scheduler::new().unwrap();
        assert!(scheduler.is_empty());
        let far = Instant::now() + Duration::from_secs(60);
        scheduler.submit(task::from_fn(|| ()), far);
        scheduler.submit(task::from_fn(|| ()), far);
        assert_eq!(scheduler.len(), 2);
    }

    #[test]
    fn test_clear_abandons_pending() {
        let scheduler = Scheduler::new().unwrap();
        let far = Instant::now() + Duration::from_secs(60);
        let (work, result) = task::with_result(|| ());
        scheduler.submit(work, far);
        scheduler.clear();
        result.wait();
        assert!(result.is_cancelled());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_timer_settles_after_deadline() {
        let scheduler = Scheduler::new().unwrap();
        let timer = scheduler.timer(Instant::now() + Duration::from_millis(20));
        assert!(!timer.is_cancelled());
        timer.wait();
        assert!(!timer.is_cancelled());
    }
}
