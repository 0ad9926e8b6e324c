use tracing_subscriber::EnvFilter;

/// Install the process-wide subscriber. `log` macro calls from every crate
/// are bridged into tracing by the subscriber's log compatibility layer.
///
/// Honors `RUST_LOG`; falls back to `info`. Calling it twice is a no-op,
/// which keeps parallel test binaries happy.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_is_idempotent() {
        super::init();
        super::init();
        log::info!("logger initialized twice without panicking");
    }
}
