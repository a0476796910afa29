//! Tracing subscriber setup for the binary.

use std::io::IsTerminal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "UNIT_LEDGER_LOG";

/// Initialize tracing with the UNIT_LEDGER_LOG environment variable.
///
/// Defaults to "info". Logs go to stderr so stdout stays reserved for the wallet report.
/// Calling this more than once is a no-op.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| {
            fmt::layer()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr)
        }))
        .try_init();
}
