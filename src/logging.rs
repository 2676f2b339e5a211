//! Tracing setup shared by the binary and any embedding front end.

use once_cell::sync::OnceCell;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

pub type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

static HANDLE: OnceCell<ReloadHandle> = OnceCell::new();

/// Install the global subscriber once. The initial filter comes from
/// `RUST_LOG` (default `info`); [`set_log_level`] swaps it later once the
/// config is known.
pub fn init_tracing() -> &'static ReloadHandle {
    HANDLE.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let (filter_layer, handle) = reload::Layer::new(env_filter);
        let installed = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(filter_layer),
            )
            .try_init();
        if let Err(err) = installed {
            eprintln!("tracing subscriber already installed: {err}");
        }
        handle
    })
}

pub fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
