//! Core execution engines and the task protocol.

pub mod error;
pub mod scheduler;
pub mod task;
pub mod worker_pool;

pub use error::PoolError;
pub use scheduler::Scheduler;
pub use task::Task;
pub use worker_pool::ThreadPool;
