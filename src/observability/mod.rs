use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Map a config log level to a tracing filter directive.
///
/// - "DISABLED" -> `None` (no subscriber installed)
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
#[must_use]
pub fn level_directive(log_level: &str) -> Option<String> {
    let level = log_level.to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// Initialize the tracing subscriber with the configured log level.
///
/// Logs go to stderr so they never interleave with translated output on
/// stdout.
pub fn init_tracing(log_level: &str, format: LogFormat) {
    let Some(directive) = level_directive(log_level) else {
        return;
    };

    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("INFO"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Log token usage for a completed stream, computing duration from start time.
pub fn log_stream_complete(model: &str, input_tokens: u64, output_tokens: u64, started: Instant) {
    log_usage(model, input_tokens, output_tokens, started.elapsed());
}

/// Log token usage for a completed response.
pub fn log_usage(model: &str, input_tokens: u64, output_tokens: u64, duration: Duration) {
    info!(
        model = model,
        input_tokens = input_tokens,
        output_tokens = output_tokens,
        total_tokens = input_tokens + output_tokens,
        duration_seconds = duration.as_secs_f64(),
        "stream completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_aliases() {
        assert_eq!(level_directive("disabled"), None);
        assert_eq!(level_directive("WARNING").as_deref(), Some("WARN"));
        assert_eq!(level_directive("CRITICAL").as_deref(), Some("ERROR"));
        assert_eq!(level_directive("debug").as_deref(), Some("DEBUG"));
    }
}
