//! Process-wide tracing subscriber whose level can be swapped after startup.
//!
//! The binary installs the subscriber before the configuration is read, so
//! config loading itself is logged, then switches to `logging.level` once the
//! file has been parsed. `RUST_LOG`, when set, wins over both.

use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Installs the stderr subscriber at `level`. Later calls are no-ops.
pub fn init_tracing(level: &str) {
    let filter = if rust_log_is_set() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let (filter_layer, handle) = reload::Layer::new(filter);
    if tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
    {
        let _ = FILTER_HANDLE.set(handle);
    }
}

/// Switches the active filter to `level`.
///
/// Does nothing when `RUST_LOG` is set or no subscriber was installed by
/// [`init_tracing`].
///
/// # Errors
///
/// Returns a message when `level` is not a valid filter directive.
pub fn apply_logging_level(level: &str) -> Result<(), String> {
    let filter = parse_level(level)?;
    if rust_log_is_set() {
        return Ok(());
    }
    match FILTER_HANDLE.get() {
        Some(handle) => handle
            .reload(filter)
            .map_err(|e| format!("failed to apply log level {level:?}: {e}")),
        None => Ok(()),
    }
}

fn parse_level(level: &str) -> Result<EnvFilter, String> {
    EnvFilter::try_new(level).map_err(|e| format!("invalid log level {level:?}: {e}"))
}

fn rust_log_is_set() -> bool {
    std::env::var_os("RUST_LOG").is_some()
}
