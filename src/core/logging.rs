//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable, e.g. `RUST_LOG=burrow=debug`
/// to see per-chunk remesh timings.
///
/// # Example
/// ```
/// burrow::core::logging::init();
/// log::info!("Sculpting session started");
/// ```
pub fn init() {
    // a host may already have installed a logger
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    )
    .format_timestamp_millis()
    .try_init();
}
