//! Log subscriber setup for the binary.
//!
//! Library code only emits `tracing` events. The binary calls [`init`] once.
//! `FOLIO_LOG` (then `RUST_LOG`) overrides the default filter. Logs go to
//! stderr so command output on stdout stays pipeable.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const ENV_VAR: &str = "FOLIO_LOG";

/// Default filter: `folio=info`, or `folio=debug` with `verbose`. The HTTP
/// trace layer logs at the same level as the crate.
pub fn default_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("folio={level},tower_http={level}")
}

fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| default_directive(verbose).into())
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(verbose))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
