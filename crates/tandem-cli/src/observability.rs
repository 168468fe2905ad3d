// Tracing initialization with a reloadable level filter.
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

use crate::config::{LogFormat, LoggingConfig};

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

pub fn init_tracing(logging: &LoggingConfig) {
    // Prefer RUST_LOG from env, otherwise use the configured level.
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(&logging.level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    // Logs go to stderr so command output stays pipeable.
    let json = (logging.format == LogFormat::Json)
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text = (logging.format == LogFormat::Text)
        .then(|| fmt::layer().with_writer(std::io::stderr));

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(json)
        .with(text)
        .try_init();
}

/// Apply a new filter directive at runtime if the reload handle is configured.
pub fn apply_logging_level(level: &str) {
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let _ = handle.modify(|f| {
            *f = EnvFilter::new(level);
        });
    }
}
