//! Configuration structures for the execution engines.

mod pool;

pub use pool::{EngineConfig, PoolConfig, SchedulerConfig};
