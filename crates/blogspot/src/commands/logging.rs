//! Logging initialization.
//!
//! In stdio mode stdout carries protocol frames, so logs go to a file in
//! the platform log directory. Everything else logs to stderr.

use blogspot_util::log::{self, default_log_path, LogConfig, LogLevel, LogTarget};
use std::path::PathBuf;

const VERBOSE_FILTER: &str =
    "blogspot=debug,blogspot_mcp=debug,blogspot_auth=debug,blogspot_blogger=debug,tower_http=debug";
const DEFAULT_FILTER: &str =
    "blogspot=info,blogspot_mcp=info,blogspot_auth=info,blogspot_blogger=info,tower_http=info";
const QUIET_FILTER: &str = "warn";

/// Where a command wants its logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Platform log file; stdout stays clean.
    File,
    /// Stderr at info level.
    Stderr,
    /// Stderr, warnings only. For commands whose output is the point.
    Quiet,
}

/// Install the process-wide subscriber. Returns the log file path if
/// logging to a file.
pub fn init_logging(verbose: bool, destination: LogDestination) -> Option<PathBuf> {
    log::init(log_config(verbose, destination))
}

fn log_config(verbose: bool, destination: LogDestination) -> LogConfig {
    let directives = match (verbose, destination) {
        (true, _) => VERBOSE_FILTER,
        (false, LogDestination::Quiet) => QUIET_FILTER,
        (false, _) => DEFAULT_FILTER,
    };
    let target = match destination {
        LogDestination::File => default_log_path()
            .map(LogTarget::File)
            .unwrap_or(LogTarget::Stderr),
        LogDestination::Stderr | LogDestination::Quiet => LogTarget::Stderr,
    };

    LogConfig {
        target,
        level: if verbose { LogLevel::Debug } else { LogLevel::Info },
        include_location: verbose,
        directives: Some(directives.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdio_logs_to_file() {
        let config = log_config(false, LogDestination::File);
        if default_log_path().is_some() {
            assert!(matches!(config.target, LogTarget::File(_)));
        }
        assert_eq!(config.directives.as_deref(), Some(DEFAULT_FILTER));
    }

    #[test]
    fn test_verbose_raises_filter() {
        let config = log_config(true, LogDestination::Quiet);
        assert_eq!(config.target, LogTarget::Stderr);
        assert_eq!(config.directives.as_deref(), Some(VERBOSE_FILTER));
        assert!(config.include_location);
    }

    #[test]
    fn test_quiet_only_warns() {
        let config = log_config(false, LogDestination::Quiet);
        assert_eq!(config.directives.as_deref(), Some(QUIET_FILTER));
    }
}
