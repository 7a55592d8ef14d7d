//! Logging setup for the CLI.
//!
//! Diagnostics go to stderr through `tracing-subscriber`; stdout is reserved
//! for the report. The level comes from `-v` flags only.

use std::sync::Once;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Map the number of `-v` flags to a filter directive.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize the global tracing subscriber. Subsequent calls are ignored.
pub fn init_logging(verbosity: u8) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::new(level_for(verbosity));
        let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

        // Another subscriber may already be installed (e.g. by a test harness).
        let _ = tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init();
    });
}
