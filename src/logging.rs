//! Logger construction.
//!
//! One environment variable controls verbosity: `TONEARM_LOG`, read once
//! when the logger is built. Recognised values (case-insensitive):
//! `DEBUG`, `INFO`, `WARN`/`WARNING`, `ERROR`. Anything else, or an
//! unset variable, means `INFO`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable consulted at logger construction.
pub const LOG_ENV_VAR: &str = "TONEARM_LOG";

/// Install the global tracing subscriber. Safe to call more than once;
/// later calls keep the first subscriber.
pub fn init() {
    let level = level_from(std::env::var(LOG_ENV_VAR).ok().as_deref());
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::new(level))
        .try_init();
}

fn level_from(value: Option<&str>) -> &'static str {
    match value
        .map(|v| v.trim().to_ascii_uppercase())
        .as_deref()
    {
        Some("DEBUG") => "debug",
        Some("INFO") | Some("") | None => "info",
        Some("WARN") | Some("WARNING") => "warn",
        Some("ERROR") => "error",
        Some(other) => {
            eprintln!("unrecognised {LOG_ENV_VAR} value {other:?}, using INFO");
            "info"
        }
    }
}
