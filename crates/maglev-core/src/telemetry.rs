//! Tracing initialisation for the maglev binary.
//!
//! `RUST_LOG` wins over the level passed in. Only the first call installs a
//! subscriber; later calls are no-ops.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// * `json`: newline-delimited JSON instead of human-readable lines.
/// * `level`: default verbosity when `RUST_LOG` is unset.
pub fn init_tracing(json: bool, level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(fmt::layer().with_target(false).json().flatten_event(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };
    // A subscriber is already installed (tests, embedding); keep it.
    installed.ok();
}
