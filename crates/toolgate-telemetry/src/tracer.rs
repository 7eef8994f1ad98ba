//! Subscriber setup

use toolgate_core::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Output goes to stderr, as
/// plain text or one JSON object per line. Calling this twice is harmless; the
/// second call leaves the first subscriber in place.
///
/// # Example
///
/// ```rust,no_run
/// use toolgate_core::config::LoggingConfig;
/// use toolgate_telemetry::init_telemetry;
///
/// init_telemetry(&LoggingConfig::default());
/// ```
pub fn init_telemetry(config: &LoggingConfig) {
    let (json, text) = match config.format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            ),
            None,
        ),
        LogFormat::Text => (
            None,
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    let _ = tracing_subscriber::registry()
        .with(json)
        .with(text)
        .with(env_filter(&config.level))
        .try_init();
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init_telemetry(&LoggingConfig::default());
        init_telemetry(&LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Json,
        });
    }

    #[test]
    fn test_invalid_level_falls_back() {
        // An unparsable directive must not abort startup.
        let _ = env_filter("not a [valid directive");
    }
}
