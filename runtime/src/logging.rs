use std::env;
use std::io;

use aplus_config::AplusConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding a tracing filter directive.
pub const LOG_ENV: &str = "APLUS_LOG";

const DEFAULT_FILTER: &str = "info";

/// Install a stderr `fmt` subscriber as the global default.
///
/// The filter comes from `APLUS_LOG`, then `configured_filter`, then `info`;
/// a directive that fails to parse is skipped. Returns `false`, leaving the
/// existing subscriber in place, if one was already installed.
pub fn init_tracing(configured_filter: Option<&str>) -> bool {
    let from_env = env::var(LOG_ENV).ok();
    let filter = build_filter(from_env.as_deref(), configured_filter);

    let installed = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("Tracing initialized");
    }
    installed
}

/// [`init_tracing`] with the `[diagnostics] log_filter` from `config`.
pub fn init_tracing_from_config(config: &AplusConfig) -> bool {
    init_tracing(config.diagnostics.log_filter.as_deref())
}

fn build_filter(from_env: Option<&str>, configured: Option<&str>) -> EnvFilter {
    [from_env, configured]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .find_map(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
