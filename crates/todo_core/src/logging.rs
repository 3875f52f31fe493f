use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Picks the filter directive: `RUST_LOG` wins over the configured one.
pub fn filter_directive(configured: Option<&str>) -> String {
    std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

/// Installs the global subscriber, writing to stderr so stdout stays
/// machine readable. An invalid directive falls back to the default.
/// Calling it twice is harmless.
pub fn init(configured: Option<&str>) {
    let directive = filter_directive(configured);
    let filter =
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
