//! Installs the process-wide `tracing` subscriber.
//!
//! Hosts embedding these crates are free to install their own subscriber instead;
//! everything logs through `tracing` and doesn't care who is listening.

use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the default filter directives.
pub const LOG_ENV_VAR: &str = "AWBW_LOG";

/// Builds the filter we use when nothing is configured: `info` for our own
/// targets, `warn` for everything else.
pub fn default_filter() -> EnvFilter {
    let mut filter = EnvFilter::new("warn");

    for target in crate::Log::ALL {
        if let Ok(directive) = format!("{target}=info").parse() {
            filter = filter.add_directive(directive);
        }
    }

    filter
}

/// Installs a formatted subscriber, honoring `AWBW_LOG` if it's set.
///
/// Returns `false` if a global subscriber was already installed (e.g, by a test
/// harness or the host application); this is not treated as an error.
pub fn init() -> bool {
    let filter = match std::env::var(LOG_ENV_VAR) {
        Ok(directives) => EnvFilter::new(directives),
        Err(_) => default_filter(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_mentions_every_target() {
        let rendered = default_filter().to_string();

        for target in crate::Log::ALL {
            assert!(rendered.contains(target), "missing {target} in {rendered}");
        }
    }

    #[test]
    fn init_is_idempotent() {
        init();
        assert!(!init());
    }
}
