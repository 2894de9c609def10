//! Logging setup for binaries embedding the agent.

use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Builds the filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// The subscriber `init_tracing` installs, usable with
/// `tracing::subscriber::with_default` for scoped logging.
pub fn subscriber(config: &LoggingConfig) -> impl Subscriber + Send + Sync + 'static {
    let json = config
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let plain = (!config.json).then(|| tracing_subscriber::fmt::layer().with_target(false));
    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(json)
        .with(plain)
}

/// Installs the global subscriber. Returns `false` if one was already set.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    subscriber(config).try_init().is_ok()
}
