//! Logging setup.
//!
//! Logs go to the configured file, or to stderr when none is set. `attach`
//! owns the terminal in raw mode, so a log file is the better choice there.

use std::fs::OpenOptions;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use agentrix_core::LoggingSettings;

/// Dependencies that are only interesting at trace level.
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "tungstenite", "tokio_tungstenite"];

/// Effective level: the configured one, raised by `-v` flags.
pub fn effective_level(configured: &str, verbose: u8) -> &str {
    match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    }
}

/// Filter directive for `level`, quieting noisy dependencies below trace.
pub fn filter_directive(level: &str) -> String {
    if level.eq_ignore_ascii_case("trace") {
        return level.to_string();
    }
    let mut directive = level.to_string();
    for target in NOISY_TARGETS {
        directive.push_str(&format!(",{target}=warn"));
    }
    directive
}

/// Install the global subscriber. Keep the guard alive until exit so
/// buffered lines are flushed.
pub fn init(settings: &LoggingSettings, verbose: u8) -> anyhow::Result<WorkerGuard> {
    let level = effective_level(&settings.level, verbose);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(level)))
        .with_context(|| format!("invalid log level '{level}'"))?;

    let (writer, guard) = match &settings.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose > 0)
        .with_ansi(settings.file.is_none())
        .with_writer(writer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))?;

    Ok(guard)
}
