//! Error types for the execution engines.

use thiserror::Error;

/// Errors produced when constructing or resizing an engine.
///
/// Errors in this crate are structural: they concern the engines
/// themselves, never the outcome of a submitted task. A failing task is
/// observed through its own completion; abandonment is the normal shutdown
/// path, not an error.
#[derive(Debug, Error)]
pub enum PoolError {
    /// An execution thread could not be started. Partial progress is
    /// preserved: threads already started remain started.
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
