//! Tracing subscriber setup.
//!
//! Every crate logs through `tracing` macros with structured fields. The
//! binary calls [`init_subscriber`] once at startup; libraries never install
//! a subscriber themselves.

use tracing_subscriber::EnvFilter;

/// Default filter when neither `RUST_LOG` nor settings provide one.
pub const DEFAULT_LEVEL: &str = "info";

/// Initialize the global tracing subscriber on stderr.
///
/// `RUST_LOG` takes precedence over `level`. With `json` set, events are
/// written as one JSON object per line; otherwise the compact human format
/// is used. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str, json: bool) {
    let filter = build_filter(level);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    if let Err(e) = installed {
        tracing::debug!(error = %e, "tracing subscriber already installed");
    }
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}
