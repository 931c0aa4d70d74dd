//! Diagnostic logging setup
//!
//! Diagnostics go to stderr through tracing-subscriber. Filter precedence:
//! `$LUMINOUS_LOG`, then `-v`/`-vv`, then `log.level` from the config.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "LUMINOUS_LOG";

pub fn filter_directive(configured: &str, verbose: u8) -> String {
    if let Ok(directive) = std::env::var(LOG_ENV) {
        if !directive.trim().is_empty() {
            return directive;
        }
    }
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(configured: &str, verbose: u8) {
    let filter = EnvFilter::new(filter_directive(configured, verbose));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
