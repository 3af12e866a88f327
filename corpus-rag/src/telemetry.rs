//! Logging setup for binaries and tests that embed the pipeline.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Install a formatted `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `default_directive` (e.g. `"info"`
/// or `"corpus_rag=debug"`) is used. Returns `false` if a global subscriber
/// was already installed, in which case nothing changes.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(true)).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let _ = init_tracing("warn");
        assert!(!init_tracing("debug"));
    }
}
