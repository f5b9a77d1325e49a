//! Logging initialization.
//!
//! Library code only emits `tracing` events; the binary installs the
//! subscriber once at startup. Output goes to stderr so stdout stays free
//! for command results.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Crate-scoped default filter, so dependency chatter stays at `warn`.
fn default_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("warn,catalog_image={level}")
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the level chosen by `verbose`. `json` switches to
/// one JSON object per event.
pub fn init(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directive_scopes_crate_level() {
        assert_eq!(default_directive(false), "warn,catalog_image=info");
        assert_eq!(default_directive(true), "warn,catalog_image=debug");
    }

    #[test]
    fn default_directive_parses() {
        assert!(EnvFilter::try_new(default_directive(true)).is_ok());
    }
}
