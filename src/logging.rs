use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_LEVEL_ENV: &str = "DEVDECK_LOG";

/// Installs the global subscriber. Logs go to stderr so stdout stays free for
/// the action bridge; with `log_dir` a daily file is written as well. Keep the
/// returned guard alive until exit or buffered file lines are lost.
pub fn init(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {:?}", dir))?;
            let appender = tracing_appender::rolling::daily(dir, "devdeck.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_log_filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(dir) = log_dir {
        tracing::debug!("Writing logs to {}", dir.display());
    }
    Ok(guard)
}

/// `DEVDECK_LOG` accepts full filter directives; a bare level applies to
/// this crate and dependencies alike.
fn build_log_filter() -> EnvFilter {
    let raw = std::env::var(LOG_LEVEL_ENV).unwrap_or_default();
    filter_from(&raw)
}

fn filter_from(raw: &str) -> EnvFilter {
    let raw = raw.trim();
    if raw.is_empty() {
        return EnvFilter::new("info");
    }
    match normalize_log_level(raw) {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_new(raw).unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

fn normalize_log_level(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        "off" => Some("off"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn normalize_log_level_accepts_aliases() {
        assert_eq!(normalize_log_level("DEBUG"), Some("debug"));
        assert_eq!(normalize_log_level(" warning "), Some("warn"));
        assert_eq!(normalize_log_level("devdeck=trace"), None);
    }

    #[test]
    fn filter_from_falls_back_to_info() {
        assert_eq!(filter_from("").max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(filter_from("Warning").max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(
            filter_from("devdeck=debug").max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
    }
}
