//! Builders to construct engines from configuration.

use crate::config::EngineConfig;
use crate::core::{PoolError, Scheduler, ThreadPool};
use crate::util::telemetry;

/// Build a worker pool and a scheduler from a root configuration.
///
/// When `cfg.init_telemetry` is set, a default `tracing` subscriber is
/// installed before the engines start, so their lifecycle logs are visible
/// without further setup.
///
/// # Errors
///
/// Returns [`PoolError::InvalidConfig`] if validation fails, or
/// [`PoolError::Spawn`] if an engine thread cannot be started.
///
/// # Example
///
/// ```
/// use taskmill::builders::build_engines;
/// use taskmill::config::EngineConfig;
///
/// let cfg = EngineConfig::from_json_str(r#"{"pool": {"worker_count": 2}}"#).unwrap();
/// let (pool, scheduler) = build_engines(&cfg).unwrap();
/// assert_eq!(pool.get_nworkers(), 2);
/// assert!(scheduler.is_empty());
/// ```
pub fn build_engines(cfg: &EngineConfig) -> Result<(ThreadPool, Scheduler), PoolError> {
    cfg.validate().map_err(PoolError::InvalidConfig)?;
    if cfg.init_telemetry {
        telemetry::init_tracing();
    }
    let pool = ThreadPool::with_config(&cfg.pool)?;
    let scheduler = Scheduler::with_config(&cfg.scheduler)?;
    Ok((pool, scheduler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_engines_installs_telemetry_when_asked() {
        let cfg = EngineConfig::from_json_str(
            r#"{"pool": {"worker_count": 1}, "init_telemetry": true}"#,
        )
        .unwrap();
        let (pool, scheduler) = build_engines(&cfg).unwrap();
        assert!(tracing::dispatcher::has_been_set());
        assert_eq!(pool.get_nworkers(), 1);
        assert!(scheduler.is_empty());
    }
}
