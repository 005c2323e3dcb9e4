//! Diagnostic logging for the relay itself.
//!
//! Diagnostics always go to stderr so relayed stdout stays byte-exact. The
//! command line belongs to the child, so the filter comes from `RUST_LOG`.

use tracing::trace;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "warn";

/// Build the filter from `directives`, falling back to [`DEFAULT_FILTER`].
pub fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize tracing on stderr.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let directives = std::env::var("RUST_LOG").ok();
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter_from(directives.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        trace!("Full CLI args: {:?}", std::env::args_os().collect::<Vec<_>>());
    }
}
