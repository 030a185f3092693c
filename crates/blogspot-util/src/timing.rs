//! RAII-based timing for registry executions and outbound calls.
//!
//! ```rust,ignore
//! use blogspot_util::TimingGuard;
//!
//! async fn call(name: &str) {
//!     let timing = TimingGuard::new("tool", name);
//!     // ... run the handler ...
//!     let elapsed = timing.finish();
//! }
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Measures an operation and logs its duration when dropped or finished.
///
/// Short operations log at debug, slower ones at info, and anything past the
/// warn threshold at warn.
pub struct TimingGuard {
    /// Kind of operation ("tool", "resource", "prompt", "blogger").
    operation_type: &'static str,
    operation_name: String,
    start: Instant,
    info_threshold_ms: u64,
    warn_threshold_ms: u64,
}

impl TimingGuard {
    pub fn new(operation_type: &'static str, operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        debug!(
            operation_type = operation_type,
            operation_name = %operation_name,
            "Starting operation"
        );
        Self {
            operation_type,
            operation_name,
            start: Instant::now(),
            info_threshold_ms: 250,
            warn_threshold_ms: 10_000,
        }
    }

    /// Set the threshold for info-level logging (in milliseconds).
    pub fn with_info_threshold(mut self, ms: u64) -> Self {
        self.info_threshold_ms = ms;
        self
    }

    /// Set the threshold for warn-level logging (in milliseconds).
    pub fn with_warn_threshold(mut self, ms: u64) -> Self {
        self.warn_threshold_ms = ms;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the clock, log, and return the elapsed time.
    pub fn finish(self) -> Duration {
        // Drop does the logging.
        self.start.elapsed()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration_ms = self.start.elapsed().as_millis() as u64;
        let duration = format_duration(duration_ms);

        if duration_ms >= self.warn_threshold_ms {
            warn!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms,
                duration = %duration,
                "Slow operation completed"
            );
        } else if duration_ms >= self.info_threshold_ms {
            info!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms,
                duration = %duration,
                "Operation completed"
            );
        } else {
            debug!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms,
                duration = %duration,
                "Operation completed"
            );
        }
    }
}

fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {:.1}s", ms / 60_000, (ms % 60_000) as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_grows() {
        let guard = TimingGuard::new("tool", "blog-post");
        std::thread::sleep(Duration::from_millis(5));
        assert!(guard.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_finish_returns_elapsed() {
        let guard = TimingGuard::new("prompt", "draft")
            .with_info_threshold(1)
            .with_warn_threshold(2);
        std::thread::sleep(Duration::from_millis(3));
        assert!(guard.finish() >= Duration::from_millis(3));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42), "42ms");
        assert_eq!(format_duration(1500), "1.50s");
        assert_eq!(format_duration(90_000), "1m 30.0s");
    }
}
