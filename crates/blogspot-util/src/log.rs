//! Logging setup using tracing.
//!
//! The subscriber is installed once at process start. In stdio mode the
//! protocol owns stdout, so logs must go to stderr or a file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogTarget {
    /// Human-readable lines on stderr.
    #[default]
    Stderr,
    /// Append to a file (created with its parent directory).
    File(PathBuf),
    /// Keep the registry for spans but drop all output.
    Off,
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub target: LogTarget,
    pub level: LogLevel,
    /// Whether to include file/line info in logs.
    pub include_location: bool,
    /// Filter directives used instead of `level`, e.g. `blogspot=debug`.
    pub directives: Option<String>,
}

impl LogConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(self.directives.as_deref().unwrap_or(self.level.as_str()))
        })
    }
}

/// Initialize logging with the given configuration.
///
/// Returns the log file path when logging to a file. If the file cannot be
/// opened, falls back to stderr and returns `None`.
pub fn init(config: LogConfig) -> Option<PathBuf> {
    let filter = config.filter();
    let registry = tracing_subscriber::registry().with(filter);

    match &config.target {
        LogTarget::File(path) => match open_log_file(path) {
            Ok(file) => {
                let layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_writer(Mutex::new(file));
                registry.with(layer).init();
                Some(path.clone())
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file {}: {e}", path.display());
                registry.with(stderr_layer(config.include_location)).init();
                None
            }
        },
        LogTarget::Stderr => {
            registry.with(stderr_layer(config.include_location)).init();
            None
        }
        LogTarget::Off => {
            registry.init();
            None
        }
    }
}

fn stderr_layer<S>(include_location: bool) -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(include_location)
        .with_line_number(include_location)
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}

/// Get the default log file path.
///
/// macOS: `~/Library/Logs/blogspot-mcp/blogspot.log`,
/// elsewhere: `<state or data dir>/blogspot-mcp/logs/blogspot.log`.
pub fn default_log_path() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir().map(|h| h.join("Library/Logs/blogspot-mcp/blogspot.log"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|p| p.join("blogspot-mcp").join("logs").join("blogspot.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_default_log_config() {
        let config = LogConfig::default();
        assert_eq!(config.target, LogTarget::Stderr);
        assert_eq!(config.level, LogLevel::Info);
        assert!(config.directives.is_none());
    }

    #[test]
    fn test_open_log_file_creates_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("blogspot.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_default_log_path_file_name() {
        if let Some(path) = default_log_path() {
            assert!(path.ends_with("blogspot.log"));
        }
    }
}
