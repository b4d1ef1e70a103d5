//! One-shot completion signalling between threads.
//!
//! A [`Promise`] / [`Completion`] pair models an asynchronous result: the
//! producing side settles the promise exactly once, and any number of
//! consumers can query readiness, block until settlement, or attach
//! continuations that run on the settling thread.
//!
//! A promise dropped without being set settles its completion as cancelled,
//! so a consumer blocked in [`Completion::wait`] can never be stranded by a
//! producer that went away.
//!
//! # Examples
//!
//! ```
//! use taskmill::promise;
//! use std::thread;
//!
//! let (promise, completion) = promise::pair();
//!
//! thread::spawn(move || {
//!     promise.set(42);
//! });
//!
//! completion.wait();
//! assert_eq!(completion.value(), Some(42));
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

type Continuation = Box<dyn FnOnce() + Send>;

enum Slot<T> {
    Pending(Vec<Continuation>),
    Ready(T),
    Cancelled,
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    settled: Condvar,
}

impl<T> Shared<T> {
    /// Move the slot out of `Pending` and run the queued continuations.
    ///
    /// Continuations run after the slot lock is released so they are free to
    /// take other locks, including an engine mutex.
    fn settle(&self, outcome: Slot<T>) {
        let continuations = {
            let mut slot = self.slot.lock();
            match &mut *slot {
                Slot::Pending(queued) => {
                    let queued = std::mem::take(queued);
                    *slot = outcome;
                    self.settled.notify_all();
                    queued
                }
                _ => return,
            }
        };

        for continuation in continuations {
            continuation();
        }
    }
}

/// The producing half of a completion pair.
///
/// A promise is settled at most once, either by [`Promise::set`] or by
/// [`Promise::cancel`]. Dropping an unsettled promise cancels it.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Promise<T> {
    /// Settle the completion with a value.
    ///
    /// Continuations attached to the completion run synchronously on the
    /// calling thread before this method returns.
    pub fn set(self, value: T) {
        self.shared.settle(Slot::Ready(value));
    }

    /// Settle the completion as cancelled.
    ///
    /// Equivalent to dropping the promise; provided for call sites where the
    /// cancellation is the point rather than a side effect.
    pub fn cancel(self) {
        self.shared.settle(Slot::Cancelled);
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        self.shared.settle(Slot::Cancelled);
    }
}

/// The consuming half of a completion pair.
///
/// Completions are cheaply cloneable; every clone observes the same
/// settlement. A completion is *settled* once its promise has been set or
/// cancelled.
pub struct Completion<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Completion<T> {
    /// Create a completion that is already settled with `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// use taskmill::promise::Completion;
    ///
    /// let completion = Completion::ready("done");
    /// assert!(completion.is_settled());
    /// assert_eq!(completion.value(), Some("done"));
    /// ```
    pub fn ready(value: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::Ready(value)),
                settled: Condvar::new(),
            }),
        }
    }

    /// Whether the promise side has been set or cancelled.
    pub fn is_settled(&self) -> bool {
        !matches!(&*self.shared.slot.lock(), Slot::Pending(_))
    }

    /// Whether the completion settled by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(&*self.shared.slot.lock(), Slot::Cancelled)
    }

    /// Block the calling thread until the completion settles.
    ///
    /// Returns immediately if the completion is already settled.
    pub fn wait(&self) {
        let mut slot = self.shared.slot.lock();
        self.shared
            .settled
            .wait_while(&mut slot, |slot| matches!(slot, Slot::Pending(_)));
    }

    /// The settled value, if the completion settled with one.
    ///
    /// Returns `None` while pending and after cancellation.
    pub fn value(&self) -> Option<T>
    where
        T: Clone,
    {
        match &*self.shared.slot.lock() {
            Slot::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Attach a one-shot continuation.
    ///
    /// The continuation runs on whichever thread settles the promise; if the
    /// completion is already settled it runs immediately on the calling
    /// thread. Continuations never run under the completion's internal lock.
    pub fn on_settled<F>(&self, continuation: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut slot = self.shared.slot.lock();
            if let Slot::Pending(queued) = &mut *slot {
                queued.push(Box::new(continuation));
                return;
            }
        }
        continuation();
    }

    /// Produce a new completion from the settlement of this one.
    ///
    /// The adapter receives the settled source completion and its return
    /// value settles the derived completion. It runs on the settling thread.
    ///
    /// # Examples
    ///
    /// ```
    /// use taskmill::promise;
    ///
    /// let (promise, completion) = promise::pair();
    /// let doubled = completion.then(|settled| settled.value().unwrap_or(0) * 2);
    /// promise.set(21);
    /// doubled.wait();
    /// assert_eq!(doubled.value(), Some(42));
    /// ```
    pub fn then<U, F>(&self, adapter: F) -> Completion<U>
    where
        T: Send + 'static,
        U: Send + 'static,
        F: FnOnce(&Completion<T>) -> U + Send + 'static,
    {
        let (promise, derived) = pair();
        let source = self.clone();
        self.on_settled(move || promise.set(adapter(&source)));
        derived
    }
}

/// Create a linked promise/completion pair.
pub fn pair<T>() -> (Promise<T>, Completion<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(Slot::Pending(Vec::new())),
        settled: Condvar::new(),
    });
    (
        Promise {
            shared: Arc::clone(&shared),
        },
        Completion { shared },
    )
}

/// Aggregate completion that settles once every input has settled.
///
/// An empty input yields an already-settled completion. Cancelled inputs
/// count as settled.
///
/// # Examples
///
/// ```
/// use taskmill::promise::{self, when_all};
///
/// let (p1, c1) = promise::pair();
/// let (p2, c2) = promise::pair();
/// let all = when_all([c1, c2]);
///
/// assert!(!all.is_settled());
/// p1.set(());
/// p2.set(());
/// all.wait();
/// ```
pub fn when_all<T, I>(completions: I) -> Completion<()>
where
    T: Send + 'static,
    I: IntoIterator<Item = Completion<T>>,
{
    let completions: Vec<_> = completions.into_iter().collect();
    if completions.is_empty() {
        return Completion::ready(());
    }

    let (promise, all) = pair();
    let remaining = Arc::new(RemainingCount {
        count: AtomicUsize::new(completions.len()),
        promise: Mutex::new(Some(promise)),
    });

    for completion in completions {
        let remaining = Arc::clone(&remaining);
        completion.on_settled(move || {
            if remaining.count.fetch_sub(1, Ordering::AcqRel) == 1 {
                if let Some(promise) = remaining.promise.lock().take() {
                    promise.set(());
                }
            }
        });
    }

    all
}

struct RemainingCount {
    count: AtomicUsize,
    promise: Mutex<Option<Promise<()>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_set_then_wait() {
        let (promise, completion) = pair();
        promise.set(7);
        completion.wait();
        assert_eq!(completion.value(), Some(7));
        assert!(!completion.is_cancelled());
    }

    #[test]
    fn test_wait_blocks_until_set() {
        let (promise, completion) = pair();
        let waiter = completion.clone();

        let handle = thread::spawn(move || {
            waiter.wait();
            waiter.value()
        });

        thread::sleep(Duration::from_millis(20));
        assert!(!completion.is_settled());
        promise.set("late");

        assert_eq!(handle.join().unwrap(), Some("late"));
    }

    #[test]
    fn test_drop_cancels() {
        let (promise, completion) = pair::<u32>();
        drop(promise);
        assert!(completion.is_settled());
        assert!(completion.is_cancelled());
        assert_eq!(completion.value(), None);
    }

    #[test]
    fn test_continuation_runs_on_settling_thread() {
        let (promise, completion) = pair();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        completion.on_settled(move || flag.store(true, Ordering::SeqCst));

        assert!(!ran.load(Ordering::SeqCst));
        promise.set(());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_continuation_after_settled_runs_inline() {
        let completion = Completion::ready(());
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        completion.on_settled(move || flag.store(true, Ordering::SeqCst));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_when_all_empty_is_ready() {
        let all = when_all(Vec::<Completion<()>>::new());
        assert!(all.is_settled());
    }

    #[test]
    fn test_when_all_counts_cancellations() {
        let (p1, c1) = pair::<()>();
        let (p2, c2) = pair::<()>();
        let all = when_all([c1, c2]);

        p1.set(());
        assert!(!all.is_settled());
        p2.cancel();
        assert!(all.is_settled());
    }

    #[test]
    fn test_then_on_cancelled_sees_no_value() {
        let (promise, completion) = pair::<i32>();
        let fallback = completion.then(|settled| settled.value().unwrap_or(-1));
        promise.cancel();
        fallback.wait();
        assert_eq!(fallback.value(), Some(-1));
    }
}
