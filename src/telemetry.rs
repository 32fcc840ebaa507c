//! Tracing setup for the command line tool.
//!
//! Library users wire their own subscriber; the binary calls `init_tracing`.

/// Install a stderr `tracing` subscriber honouring `RUST_LOG`, defaulting to
/// `default_level`. Returns false if a global subscriber was already set.
pub fn init_tracing(default_level: &str) -> bool {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
