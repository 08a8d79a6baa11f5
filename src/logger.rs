// Logging setup on top of tracing.
// Log lines go to stderr so stdout stays free for the run result.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

static DEBUG: AtomicBool = AtomicBool::new(false);

// Install the global subscriber. RUST_LOG wins when set; otherwise --debug
// selects the debug level and the default is info.
pub fn init(debug: bool) {
    DEBUG.store(debug, Ordering::Relaxed);
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// Returns true if debug logging was requested.
pub fn is_debug() -> bool {
    DEBUG.load(Ordering::Relaxed)
}
