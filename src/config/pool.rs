//! Engine configuration structures.

use serde::{Deserialize, Serialize};

/// Default number of worker threads: one per available CPU.
fn default_worker_count() -> usize {
    num_cpus::get()
}

/// Default thread stack size: 2MB.
fn default_thread_stack_size() -> usize {
    2 * 1024 * 1024
}

/// Default prefix for engine thread names.
fn default_thread_name_prefix() -> String {
    "taskmill".to_owned()
}

/// Configuration for a [`ThreadPool`](crate::ThreadPool).
///
/// # Example
///
/// ```
/// use taskmill::config::PoolConfig;
///
/// let config = PoolConfig::new()
///     .with_worker_count(4)
///     .with_thread_name_prefix("render");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads started at construction.
    ///
    /// May be zero: submissions then queue until a resize grows the pool.
    /// Default: `num_cpus::get()`.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Stack size per worker thread in bytes.
    ///
    /// Default: 2MB (2 * 1024 * 1024 bytes).
    #[serde(default = "default_thread_stack_size")]
    pub thread_stack_size: usize,

    /// Prefix for worker thread names (`<prefix>-worker-<id>`).
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            thread_stack_size: default_thread_stack_size(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl PoolConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the thread stack size.
    #[must_use]
    pub fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = size;
        self
    }

    /// Set the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first rejected value.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64KB".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }
}

/// Configuration for a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Stack size for the timer thread in bytes.
    ///
    /// Default: 2MB (2 * 1024 * 1024 bytes).
    #[serde(default = "default_thread_stack_size")]
    pub thread_stack_size: usize,

    /// Prefix for the timer thread name (`<prefix>-timer`).
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thread_stack_size: default_thread_stack_size(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timer thread stack size.
    #[must_use]
    pub fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = size;
        self
    }

    /// Set the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first rejected value.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64KB".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }
}

/// Root configuration covering both engines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Worker pool configuration.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Scheduler configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Install the default telemetry subscriber when building the engines.
    ///
    /// Off by default so embedding applications keep control of their own
    /// `tracing` setup. See [`crate::util::telemetry::init_tracing`].
    #[serde(default)]
    pub init_telemetry: bool,
}

impl EngineConfig {
    /// Validate both engine configurations.
    ///
    /// # Errors
    ///
    /// Returns a description of the first rejected value, prefixed with the
    /// engine it belongs to.
    pub fn validate(&self) -> Result<(), String> {
        self.pool.validate().map_err(|e| format!("pool: {e}"))?;
        self.scheduler
            .validate()
            .map_err(|e| format!("scheduler: {e}"))?;
        Ok(())
    }

    /// Parse an engine configuration from a JSON string and validate it.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation failure description.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(PoolConfig::default().validate().is_ok());
        assert!(SchedulerConfig::default().validate().is_ok());
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_small_stack_rejected() {
        let config = PoolConfig::new().with_thread_stack_size(1024);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_allowed() {
        let config = PoolConfig::new().with_worker_count(0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_str_applies_defaults() {
        let cfg = EngineConfig::from_json_str(r#"{"pool": {"worker_count": 2}}"#).unwrap();
        assert_eq!(cfg.pool.worker_count, 2);
        assert_eq!(cfg.pool.thread_stack_size, 2 * 1024 * 1024);
        assert_eq!(cfg.scheduler.thread_name_prefix, "taskmill");
    }

    #[test]
    fn test_from_json_str_rejects_invalid() {
        let result = EngineConfig::from_json_str(r#"{"pool": {"thread_name_prefix": ""}}"#);
        assert!(result.is_err());
    }
}
