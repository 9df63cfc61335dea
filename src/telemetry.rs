//! Process-wide structured logging, initialized once at startup. Modeled on
//! the teacher's own `init_logging`: an env-filter-driven `tracing`
//! subscriber writing to stderr, so `RUST_LOG=debug` surfaces per-file and
//! per-function spans without polluting the diagnostic output on stdout.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub(crate) fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lockbalance=info,warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
