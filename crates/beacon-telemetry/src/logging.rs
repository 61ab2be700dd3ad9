use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the tracing subscriber installed by the SDK.
///
/// Host applications that already run their own subscriber simply skip
/// `init_logging`; every crate in the pipeline logs through `tracing` and
/// will attach to whatever subscriber is installed.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Default log level. Overridden by the RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "beacon_emitter" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

/// Install a global tracing subscriber. Call at most once per process;
/// returns false if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let mut filter_str = config.log_level.to_string().to_lowercase();
    for (module, level) in &config.module_levels {
        filter_str.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
    }
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    if config.json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(env_filter);
        tracing_subscriber::registry().with(fmt_layer).try_init().is_ok()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(env_filter);
        tracing_subscriber::registry().with(fmt_layer).try_init().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.module_levels.is_empty());
        assert!(!config.json);
    }

    #[test]
    fn second_init_reports_already_installed() {
        let config = LoggingConfig::default();
        let first = init_logging(&config);
        let second = init_logging(&config);
        // Whichever call won, the other must report failure.
        assert!(first || !second);
        assert!(!(first && second));
    }
}
