use tracing_subscriber::EnvFilter;

/// Filter variable checked before `RUST_LOG`.
pub const LOG_VAR: &str = "OBJECTFS_LOG";

/// Install a stderr subscriber.
///
/// The filter comes from `OBJECTFS_LOG`, then `RUST_LOG`, then `info`.
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_env(LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
