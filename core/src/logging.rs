use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::ConfigError;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber described by `logging`.
///
/// `RUST_LOG`, when set, wins over `logging.level`. Calling this more than
/// once is an error because the global subscriber can only be set once.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), ConfigError> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = build_filter(logging)?;

    let mut maybe_writer = None;
    if logging.file {
        let dir = log_directory(logging);
        std::fs::create_dir_all(&dir)
            .map_err(|e| ConfigError::Logging(format!("create log dir failed: {e}")))?;
        let file_name = format!("planrun.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err(ConfigError::Logging(
            "logging enabled but both console and file output are off".to_string(),
        ));
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}

fn build_filter(logging: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => Ok(EnvFilter::from_default_env()),
        _ => EnvFilter::try_new(&logging.level).map_err(|e| ConfigError::Logging(e.to_string())),
    }
}

fn log_directory(logging: &LoggingConfig) -> PathBuf {
    match logging
        .directory
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(d) => PathBuf::from(d),
        None => std::env::temp_dir().join("planrun"),
    }
}
