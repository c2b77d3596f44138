//! Logging initialization.
//!
//! Uses `tracing` with `tracing-subscriber`, writing to stderr. The level is
//! controlled with `RUST_LOG`:
//!
//! ```bash
//! # Default: info for the lab, warn for the HTTP stack
//! sqli-lab
//!
//! # Log every parameter resolution and swallowed parse error
//! RUST_LOG=sqli_lab=debug sqli-lab
//! ```

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "sqli_lab=info,tower_http=warn";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
