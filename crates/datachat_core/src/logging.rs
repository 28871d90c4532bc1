//! Structured logging for the datachat binary.
//!
//! Streamed answers go to stdout, so every log line goes to stderr. A
//! non-interactive run (piped, scripted) additionally writes a daily rotating
//! file under the data directory.
//!
//! Filter precedence: explicit config value, then `DATACHAT_LOG`, then
//! `RUST_LOG`, then the build-type default.

use crate::config::ClientConfig;

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive.
pub const ENV_LOG: &str = "DATACHAT_LOG";

const LOG_FILE_PREFIX: &str = "datachat";

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// stderr only
    Console,
    /// stderr (info and above) plus the rotating file
    ConsoleAndFile,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory for log files
    pub log_dir: PathBuf,
    /// Output destination
    pub target: LogTarget,
    /// Filter directive overriding the environment
    pub log_filter: Option<String>,
}

impl LogConfig {
    /// Interactive terminals log to the console only.
    pub fn new(log_dir: PathBuf) -> Self {
        let target = if atty::is(atty::Stream::Stderr) {
            LogTarget::Console
        } else {
            LogTarget::ConsoleAndFile
        };
        Self { log_dir, target, log_filter: None }
    }

    /// Defaults plus the client config's filter, if any.
    pub fn for_client(config: &ClientConfig) -> Self {
        let log_config = Self::new(log_dir());
        match &config.log_filter {
            Some(filter) => log_config.with_filter(filter.clone()),
            None => log_config,
        }
    }

    /// Use `filter` instead of the environment.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Override the output destination.
    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }
}

/// Keeps the file writer alive; dropping it flushes pending entries.
pub struct LoggingGuard {
    _worker_guard: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// Falls back to console-only when the log file cannot be opened. A second
/// call is a no-op.
pub fn init_logging(config: LogConfig) -> LoggingGuard {
    let ResolvedFilter { filter, source } = resolve_filter(config.log_filter.as_deref());
    let guard = install(&config, filter);
    tracing::debug!(filter_source = ?source, target = ?config.target, "Logging initialized");
    guard
}

fn install(config: &LogConfig, filter: EnvFilter) -> LoggingGuard {
    if config.target == LogTarget::Console {
        return init_console(filter);
    }

    match open_log_file(config) {
        Ok(appender) => {
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            let writer = std::io::stderr.with_max_level(tracing::Level::INFO).and(file_writer);
            let _ = tracing_subscriber::fmt()
                .with_writer(writer)
                .with_env_filter(filter)
                .with_ansi(false)
                .with_target(true)
                .try_init();
            LoggingGuard { _worker_guard: Some(guard) }
        }
        Err(e) => {
            eprintln!("Warning: file logging unavailable ({e}); logging to stderr only.");
            init_console(filter)
        }
    }
}

fn init_console(filter: EnvFilter) -> LoggingGuard {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
    LoggingGuard { _worker_guard: None }
}

fn open_log_file(config: &LogConfig) -> std::io::Result<RollingFileAppender> {
    std::fs::create_dir_all(&config.log_dir)?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(&config.log_dir)
        .map_err(|e| std::io::Error::other(e.to_string()))
}

/// Which setting produced the active filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterSource {
    Config,
    DatachatLog,
    RustLog,
    Default,
}

struct ResolvedFilter {
    filter: EnvFilter,
    source: FilterSource,
}

fn resolve_filter(configured: Option<&str>) -> ResolvedFilter {
    let candidates = [
        (configured.map(String::from), FilterSource::Config),
        (std::env::var(ENV_LOG).ok(), FilterSource::DatachatLog),
        (std::env::var("RUST_LOG").ok(), FilterSource::RustLog),
    ];
    for (directive, source) in candidates {
        let Some(directive) = directive.filter(|d| !d.trim().is_empty()) else {
            continue;
        };
        match EnvFilter::try_new(&directive) {
            Ok(filter) => return ResolvedFilter { filter, source },
            Err(e) => eprintln!("Warning: ignoring log filter '{directive}': {e}"),
        }
    }
    ResolvedFilter { filter: EnvFilter::new(default_log_filter()), source: FilterSource::Default }
}

/// Build-type default filter; HTTP internals stay quiet.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,datachat=debug,datachat_core=trace,hyper=warn,hyper_util=warn,reqwest=warn"
    } else {
        "warn,datachat=info,datachat_core=info,hyper=warn,hyper_util=warn,reqwest=warn"
    }
}

/// Directory for log files.
pub fn log_dir() -> PathBuf {
    crate::config::default_data_dir().join("logs")
}
