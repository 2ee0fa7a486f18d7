//! Logging setup for the `disruption-aggregator` binary.
//!
//! Log lines always go to stderr; the suite may be written to stdout and
//! must stay machine-readable.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Targets that log at the requested level; everything else logs at `warn`.
/// The library and the binary (named after it) share this target prefix.
const OWN_TARGETS: &[&str] = &["disruption_aggregator"];

/// Default filter when `RUST_LOG` is unset: `level` for the aggregator's
/// own crates (`--verbose` selects `debug`), `warn` for dependencies.
fn default_filter(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(OWN_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

/// Install the global subscriber. `json` switches to one JSON object per
/// event, suited to log collectors in CI. A `RUST_LOG` value replaces the
/// default filter entirely. Later calls are no-ops.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));
    let base = fmt::layer().with_target(false).with_writer(std::io::stderr);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(base.json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(base)
            .try_init()
            .ok();
    }
}
