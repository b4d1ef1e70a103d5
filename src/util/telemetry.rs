//! Telemetry helpers for structured logging.

/// Install a default `tracing` subscriber filtered by `RUST_LOG`.
///
/// Engines log through whatever dispatcher is active. When the embedding
/// application never installs one, this sets up a plain `fmt` subscriber so
/// engine lifecycle logs are not silently dropped. Calling it again, or
/// after the application installed its own subscriber, is a no-op.
pub fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        assert!(tracing::dispatcher::has_been_set());
        // A second call must not panic or replace the dispatcher.
        init_tracing();
        assert!(tracing::dispatcher::has_been_set());
    }
}
