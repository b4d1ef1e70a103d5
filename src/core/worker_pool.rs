//! Resizable worker pool executing tasks on dedicated OS threads.
//!
//! A [`ThreadPool`] owns N worker threads pulling from a single FIFO of
//! ready tasks, plus a set of *delayed* tasks whose entry into the FIFO is
//! gated by an external timer completion. The pool can be resized live in
//! either direction and shuts down cleanly: its destructor returns only once
//! every worker thread has terminated and every task it ever held has been
//! executed or abandoned exactly once.
//!
//! # Example
//!
//! ```
//! use taskmill::{task, ThreadPool};
//!
//! let pool = ThreadPool::new(2).unwrap();
//! let (work, result) = task::with_result(|| 40 + 2);
//! pool.submit(work);
//! result.wait();
//! assert_eq!(result.value(), Some(42));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::core::error::PoolError;
use crate::core::task::{self, Task};
use crate::promise::{self, Completion};

/// A fixed-but-resizable pool of worker threads with a shared task FIFO.
///
/// Submissions are FIFO with respect to workers pulling from the front;
/// execution order across workers is unspecified. All user callbacks run
/// outside the pool lock.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    config: PoolConfig,
}

/// State shared between the pool handle, its workers, and delayed-task
/// bridges. The `Arc` keeps the block alive for any timer continuation that
/// outlives the pool handle itself.
struct PoolShared {
    state: Mutex<PoolState>,
    /// Signalled on new ready work, stop requests, and shutdown progress.
    event: Condvar,
}

#[derive(Default)]
struct PoolState {
    /// Worker handles; the suffix of length `pending` holds workers that
    /// have been asked to stop but not yet joined.
    workers: Vec<Arc<Worker>>,
    pending: usize,
    /// FIFO of ready tasks.
    tasks: VecDeque<Arc<dyn Task>>,
    /// Outstanding delayed-task bridges, keyed by bridge id.
    delayed: HashMap<u64, Arc<DelayedTask>>,
    /// Bridges claimed by their timer while a drain is in progress; `clear`
    /// waits for this to reach zero.
    delayed_count: usize,
    next_worker_id: u64,
    next_delayed_id: u64,
}

/// One worker thread: a stop flag and an observable completion resolved
/// when the thread exits its loop.
struct Worker {
    stop: AtomicBool,
    done: Completion<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    fn spawn(
        shared: &Arc<PoolShared>,
        config: &PoolConfig,
        worker_id: u64,
    ) -> Result<Arc<Self>, PoolError> {
        let (exited, done) = promise::pair();
        let worker = Arc::new(Self {
            stop: AtomicBool::new(false),
            done,
            handle: Mutex::new(None),
        });

        let thread = thread::Builder::new()
            .name(format!("{}-worker-{worker_id}", config.thread_name_prefix))
            .stack_size(config.thread_stack_size)
            .spawn({
                let shared = Arc::clone(shared);
                let worker = Arc::clone(&worker);
                move || {
                    debug!(worker_id, "worker thread started");
                    shared.run_worker(&worker.stop);
                    debug!(worker_id, "worker thread exiting");
                    exited.set(());
                }
            })?;

        *worker.handle.lock() = Some(thread);
        Ok(worker)
    }

    /// Request a voluntary stop at the worker's next idle point.
    fn stop_request(&self) {
        self.stop.swap(true, Ordering::Relaxed);
    }

    /// Join the underlying thread. Callers wait on `done` first, so this
    /// does not block meaningfully.
    fn join(&self) {
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("worker thread terminated by panic");
            }
        }
    }
}

impl PoolShared {
    /// Worker loop: pop-execute until a stop request is observed.
    ///
    /// Wake-ups may be spurious; both the stop flag and the queue are
    /// re-evaluated on every iteration. Tasks execute outside the lock.
    fn run_worker(&self, stop: &AtomicBool) {
        let mut state = self.state.lock();
        loop {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            if let Some(task) = state.tasks.pop_front() {
                drop(state);
                task::run(&task);
                state = self.state.lock();
                continue;
            }
            self.event.wait(&mut state);
        }
    }
}

/// Bridge coupling a timer completion to the pool.
///
/// The `claimed` latch arbitrates between the timer firing and a concurrent
/// `clear`/shutdown: whichever side wins the swap disposes of the task, the
/// losing side does nothing beyond dropping its reference.
struct DelayedTask {
    shared: Arc<PoolShared>,
    id: u64,
    claimed: AtomicBool,
    task: Mutex<Option<Arc<dyn Task>>>,
}

impl DelayedTask {
    /// Claim the bridge. Returns `false` if the other side already has.
    fn mark_claimed(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    /// Timer-fired path: unlink and move the owned task into the ready FIFO.
    ///
    /// Runs on whatever thread settles the timer completion, possibly a
    /// worker of this very pool; the single critical section below never
    /// nests the pool lock.
    fn promote(&self) {
        if !self.mark_claimed() {
            // The pool cleared or destructed first; it owns the task now.
            return;
        }

        let mut state = self.shared.state.lock();
        state.delayed.remove(&self.id);
        if let Some(task) = self.task.lock().take() {
            state.tasks.push_back(task);
        }

        // The notify must happen under the lock: with it released, a
        // concurrently destructing pool could tear the condvar down between
        // the unlock and the wake.
        if state.delayed_count == 0 {
            self.shared.event.notify_one();
        } else {
            state.delayed_count -= 1;
            if state.delayed_count == 0 {
                // Broadcast so the drain waiter in `clear` cannot lose the
                // wake to an idle worker parked on the same condvar.
                self.shared.event.notify_all();
            }
        }
    }
}

impl ThreadPool {
    /// Create a pool with `nworkers` worker threads and default settings.
    ///
    /// `nworkers` may be zero; submissions then queue until a later
    /// [`set_nworkers`](Self::set_nworkers) grows the pool.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if a worker thread cannot be started.
    /// Workers already started remain started.
    pub fn new(nworkers: usize) -> Result<Self, PoolError> {
        Self::with_config(&PoolConfig::new().with_worker_count(nworkers))
    }

    /// Create a pool from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] for a rejected configuration or
    /// [`PoolError::Spawn`] if a worker thread cannot be started.
    pub fn with_config(config: &PoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;
        let pool = Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState::default()),
                event: Condvar::new(),
            }),
            config: config.clone(),
        };
        pool.set_nworkers(config.worker_count)?;
        Ok(pool)
    }

    /// Current logical worker count, excluding workers that are stopping.
    pub fn get_nworkers(&self) -> usize {
        let state = self.shared.state.lock();
        state.workers.len() - state.pending
    }

    /// Resize the pool to `n` workers.
    ///
    /// Growing joins whatever part of the stopping suffix has already
    /// finished, starts the missing workers, and returns an already-settled
    /// completion. Shrinking marks the surplus workers, wakes all waiters,
    /// and returns a completion that settles once every marked worker has
    /// exited its loop. `set_nworkers(k)` twice in a row is a no-op the
    /// second time.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if a worker thread cannot be started
    /// while growing; workers already started remain started.
    pub fn set_nworkers(&self, n: usize) -> Result<Completion<()>, PoolError> {
        let mut state = self.shared.state.lock();
        let live = state.workers.len() - state.pending;
        if n == live {
            return Ok(Completion::ready(()));
        }

        if n > live {
            let mut stopping = state.workers.split_off(live);
            stopping.retain(|worker| {
                if worker.done.is_settled() {
                    worker.join();
                    false
                } else {
                    true
                }
            });
            state.pending = stopping.len();

            let mut spawn_error = None;
            for _ in live..n {
                let worker_id = state.next_worker_id;
                state.next_worker_id += 1;
                match Worker::spawn(&self.shared, &self.config, worker_id) {
                    Ok(worker) => state.workers.push(worker),
                    Err(error) => {
                        spawn_error = Some(error);
                        break;
                    }
                }
            }
            state.workers.append(&mut stopping);

            match spawn_error {
                None => Ok(Completion::ready(())),
                Some(error) => Err(error),
            }
        } else {
            let live_end = state.workers.len() - state.pending;
            let marked: Vec<Arc<Worker>> = state.workers[n..live_end].to_vec();
            state.pending += live - n;
            for worker in &marked {
                worker.stop_request();
            }
            let exits: Vec<Completion<()>> =
                marked.iter().map(|worker| worker.done.clone()).collect();
            drop(state);
            self.shared.event.notify_all();

            Ok(promise::when_all(exits).then(|_| ()))
        }
    }

    /// Append a task to the ready FIFO and wake one worker.
    ///
    /// With zero live workers the task stays queued indefinitely, until a
    /// resize or [`clear`](Self::clear).
    pub fn submit(&self, task: Arc<dyn Task>) {
        let mut state = self.shared.state.lock();
        state.tasks.push_back(task);
        drop(state);
        self.shared.event.notify_one();
    }

    /// Submit a task gated by a timer completion.
    ///
    /// The task enters the ready FIFO at the moment `timer` settles, not at
    /// submission time. An already-settled timer promotes the task
    /// synchronously before this method returns. If the pool is cleared or
    /// destructed before the timer settles, the task is abandoned instead.
    pub fn submit_delayed(&self, task: Arc<dyn Task>, timer: Completion<()>) {
        let bridge = {
            let mut state = self.shared.state.lock();
            let id = state.next_delayed_id;
            state.next_delayed_id += 1;
            let bridge = Arc::new(DelayedTask {
                shared: Arc::clone(&self.shared),
                id,
                claimed: AtomicBool::new(false),
                task: Mutex::new(Some(task)),
            });
            state.delayed.insert(id, Arc::clone(&bridge));
            bridge
        };
        timer.on_settled(move || bridge.promote());
    }

    /// Cancel all outstanding ready and delayed work without stopping the
    /// workers.
    ///
    /// Every delayed bridge that existed at entry is resolved by the time
    /// this returns: abandoned here, or promoted by a concurrently firing
    /// timer and then abandoned with the rest of the queue. Already-running
    /// tasks run to completion. Idempotent on an empty pool; not intended
    /// for concurrent callers.
    pub fn clear(&self) {
        let mut abandoned: Vec<Arc<dyn Task>> = Vec::new();
        {
            let mut state = self.shared.state.lock();
            debug_assert_eq!(state.delayed_count, 0);

            let bridges: Vec<Arc<DelayedTask>> = state.delayed.values().cloned().collect();
            for bridge in bridges {
                if bridge.mark_claimed() {
                    state.delayed.remove(&bridge.id);
                    if let Some(task) = bridge.task.lock().take() {
                        abandoned.push(task);
                    }
                } else {
                    // The timer won the race and is promoting on another
                    // thread; account for it and wait for the drain.
                    state.delayed_count += 1;
                }
            }

            self.shared
                .event
                .wait_while(&mut state, |state| state.delayed_count > 0);
            abandoned.extend(std::mem::take(&mut state.tasks));
        }

        for task in abandoned {
            task::abandon(&task);
        }
    }
}

impl Drop for ThreadPool {
    /// Stop every worker, cancel all queued and delayed work, and wait for
    /// the threads to terminate.
    fn drop(&mut self) {
        let workers = {
            let mut state = self.shared.state.lock();
            state.pending = 0;
            std::mem::take(&mut state.workers)
        };

        for worker in &workers {
            worker.stop_request();
        }
        self.shared.event.notify_all();

        // Clearing delayed work after the stop requests keeps a concurrently
        // firing timer from resurrecting a task into the FIFO once the pool
        // is considered quiescent.
        self.clear();

        for worker in workers {
            worker.done.wait();
            worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn test_submit_executes() {
        let pool = ThreadPool::new(2).unwrap();
        let (work, result) = task::with_result(|| 11);
        pool.submit(work);
        result.wait();
        assert_eq!(result.value(), Some(11));
    }

    #[test]
    fn test_get_nworkers_matches_construction() {
        let pool = ThreadPool::new(3).unwrap();
        assert_eq!(pool.get_nworkers(), 3);
    }

    #[test]
    fn test_resize_is_idempotent() {
        let pool = ThreadPool::new(2).unwrap();
        let first = pool.set_nworkers(4).unwrap();
        first.wait();
        let second = pool.set_nworkers(4).unwrap();
        assert!(second.is_settled());
        assert_eq!(pool.get_nworkers(), 4);
    }

    #[test]
    fn test_clear_on_empty_pool_is_idempotent() {
        let pool = ThreadPool::new(1).unwrap();
        pool.clear();
        pool.clear();
    }

    #[test]
    fn test_zero_worker_pool_queues_until_resize() {
        let pool = ThreadPool::new(0).unwrap();
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        pool.submit(task::from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), 0);

        pool.set_nworkers(1).unwrap().wait();
        let (fence, fenced) = task::with_result(|| ());
        pool.submit(fence);
        fenced.wait();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delayed_with_ready_timer_executes() {
        let pool = ThreadPool::new(1).unwrap();
        let (work, result) = task::with_result(|| 5);
        pool.submit_delayed(work, Completion::ready(()));
        result.wait();
        assert_eq!(result.value(), Some(5));
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = ThreadPool::new(1).unwrap();
        pool.submit(task::from_fn(|| panic!("task failure")));
        let (work, result) = task::with_result(|| "alive");
        pool.submit(work);
        result.wait();
        assert_eq!(result.value(), Some("alive"));
        assert_eq!(pool.get_nworkers(), 1);
    }
}
