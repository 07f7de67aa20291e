//! Logging initialization
//!
//! Installs a `tracing-subscriber` fmt subscriber. `RUST_LOG` takes
//! precedence; otherwise the level follows `OrmConfig::debug`.

use tracing_subscriber::EnvFilter;

use crate::config::OrmConfig;

/// Default filter directive for a config
pub fn default_directive(config: &OrmConfig) -> &'static str {
    if config.debug {
        "palimpsest_core=debug,palimpsest_bytecode=debug"
    } else {
        "info"
    }
}

/// Install the global subscriber
///
/// Returns `false` if a subscriber was already installed.
pub fn init(config: &OrmConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Logging initialized (debug: {})", config.debug);
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        let mut config = OrmConfig::default();
        assert_eq!(default_directive(&config), "info");
        config.debug = true;
        assert_eq!(
            default_directive(&config),
            "palimpsest_core=debug,palimpsest_bytecode=debug"
        );
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = OrmConfig::default();
        init(&config);
        assert!(!init(&config));
    }
}
