//! Logging initialisation.
//!
//! Logs go to stderr so command output on stdout stays clean. `RUST_LOG`
//! overrides the configured level; `-v` raises it to `debug` and `-vv` to
//! `trace`. When a log file is configured, a daily rolling copy is written
//! through a non-blocking writer whose guard must live until exit.

use std::path::Path;

use time::format_description::well_known::Rfc3339;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::CliError;

/// Pick the filter directive from verbosity and the configured level.
pub fn filter_level(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber. Returns the file writer guard, if any.
pub fn init_logging(
    verbose: u8,
    configured_level: &str,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>, CliError> {
    let level = filter_level(verbose, configured_level);
    let filter = if verbose > 0 {
        EnvFilter::new(&level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level))
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::new(Rfc3339))
        .with_target(false);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| CliError::Logging(format!("Not a file path: {}", path.display())))?;
            std::fs::create_dir_all(directory).map_err(|e| {
                CliError::Logging(format!("Cannot create {}: {}", directory.display(), e))
            })?;

            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(LocalTime::new(Rfc3339))
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_level() {
        assert_eq!(filter_level(0, "warn"), "warn");
        assert_eq!(filter_level(1, "warn"), "debug");
        assert_eq!(filter_level(3, "warn"), "trace");
    }
}
