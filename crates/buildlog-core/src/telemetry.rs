//! Tracing setup for the buildlog binary.
//!
//! Diagnostics always go to stderr: stdout carries cohesion blocks and the
//! summary, and the two must never mix.
//!
//! Filtering comes from `BUILDLOG_LOG`, then `RUST_LOG`, then the level the
//! caller passes. `BUILDLOG_LOG_FORMAT=json` switches to JSON lines the same
//! way the `--json` flag does.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives for buildlog diagnostics, e.g. `buildlog_core=debug`.
pub const LOG_ENV: &str = "BUILDLOG_LOG";

/// Set to `json` for newline-delimited JSON diagnostics.
pub const LOG_FORMAT_ENV: &str = "BUILDLOG_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `--json` wins; otherwise the format env value decides.
    pub fn resolve(json_flag: bool, env_value: Option<&str>) -> Self {
        let env_json = env_value.is_some_and(|v| v.trim().eq_ignore_ascii_case("json"));
        if json_flag || env_json {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// First non-empty directive source: `BUILDLOG_LOG`, `RUST_LOG`, `level`.
fn filter_directives(
    buildlog_log: Option<String>,
    rust_log: Option<String>,
    level: Level,
) -> String {
    buildlog_log
        .into_iter()
        .chain(rust_log)
        .find(|d| !d.trim().is_empty())
        .unwrap_or_else(|| level.as_str().to_string())
}

fn build_filter(directives: &str, level: Level) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing(json: bool, level: Level) {
    let directives = filter_directives(
        std::env::var(LOG_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        level,
    );
    let env_filter = build_filter(&directives, level);
    let format = LogFormat::resolve(json, std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry.with(layer.json()).try_init().ok(),
        LogFormat::Text => registry.with(layer).try_init().ok(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_flag_or_env() {
        assert_eq!(LogFormat::resolve(false, None), LogFormat::Text);
        assert_eq!(LogFormat::resolve(true, None), LogFormat::Json);
        assert_eq!(LogFormat::resolve(false, Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::resolve(false, Some("pretty")), LogFormat::Text);
    }

    #[test]
    fn test_buildlog_log_takes_precedence() {
        let directives = filter_directives(
            Some("buildlog_core=debug".to_string()),
            Some("info".to_string()),
            Level::WARN,
        );
        assert_eq!(directives, "buildlog_core=debug");
    }

    #[test]
    fn test_falls_back_to_rust_log_then_level() {
        assert_eq!(
            filter_directives(Some("  ".to_string()), Some("info".to_string()), Level::WARN),
            "info"
        );
        assert_eq!(filter_directives(None, None, Level::DEBUG), "DEBUG");
    }

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
    }
}
