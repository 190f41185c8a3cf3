//! Process-wide `tracing` setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding a filter directive, e.g. `stickyboard=debug`.
pub const LOG_ENV: &str = "STICKYBOARD_LOG";

/// Filter from `STICKYBOARD_LOG` if set and valid, else `fallback`, else `info`.
pub fn build_filter(env_value: Option<&str>, fallback: &str) -> EnvFilter {
    env_value
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_new(fallback).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the stderr subscriber. Later calls are ignored.
///
/// Stdout is left alone so `--json` output stays parseable.
pub fn init_logging(fallback: &str) {
    let env_value = std::env::var(LOG_ENV).ok();
    let installed = fmt()
        .with_env_filter(build_filter(env_value.as_deref(), fallback))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(fallback, "logging initialized");
    }
}
