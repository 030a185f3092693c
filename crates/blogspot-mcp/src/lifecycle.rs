//! Server lifecycle: initialize, start, stop.
//!
//! Hooks are supplied by the caller. `start` runs `initialize` first when
//! needed; `stop` is a no-op unless the server is running.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

type Hook = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

fn boxed<F, Fut>(f: F) -> Hook
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move || Box::pin(f()) as BoxFuture<'static, anyhow::Result<()>>)
}

/// Point-in-time view of a lifecycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub name: String,
    pub initialized: bool,
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: Option<u64>,
}

/// Drives a server through its init/start/stop hooks.
pub struct Lifecycle {
    name: String,
    init: Option<Hook>,
    start: Option<Hook>,
    stop: Option<Hook>,
    initialized: bool,
    running: bool,
    started_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init: None,
            start: None,
            stop: None,
            initialized: false,
            running: false,
            started_at: None,
        }
    }

    pub fn on_init<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.init = Some(boxed(f));
        self
    }

    /// The start hook runs the server; it resolves when serving ends.
    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.start = Some(boxed(f));
        self
    }

    pub fn on_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.stop = Some(boxed(f));
        self
    }

    /// Run the init hook once.
    pub async fn initialize(&mut self) -> anyhow::Result<()> {
        if self.initialized {
            return Ok(());
        }

        info!(server = %self.name, "Initializing");
        if let Some(init) = self.init.take() {
            if let Err(e) = init().await {
                error!(server = %self.name, error = %e, "Initialization failed");
                return Err(e);
            }
        }
        self.initialized = true;
        Ok(())
    }

    /// Initialize if needed, then run the start hook to completion.
    ///
    /// The lifecycle counts as running from the moment the hook is entered
    /// until [`stop`](Self::stop).
    pub async fn start(&mut self) -> anyhow::Result<()> {
        self.initialize().await?;

        self.running = true;
        self.started_at = Some(Utc::now());
        info!(server = %self.name, "Starting");

        if let Some(start) = self.start.take() {
            if let Err(e) = start().await {
                error!(server = %self.name, error = %e, "Server failed");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Run the stop hook. Does nothing when not running.
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        if !self.running {
            return Ok(());
        }

        self.running = false;
        let uptime = self.uptime();
        info!(server = %self.name, uptime_secs = uptime.map(|d| d.as_secs()), "Stopping");
        if let Some(stop) = self.stop.take() {
            if let Err(e) = stop().await {
                error!(server = %self.name, error = %e, "Shutdown failed");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Start, then stop once serving ends, even if it ended in error.
    ///
    /// The serving error wins over a shutdown error.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let served = self.start().await;
        let stopped = self.stop().await;
        served.and(stopped)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn uptime(&self) -> Option<Duration> {
        let started = self.started_at?;
        (Utc::now() - started).to_std().ok()
    }

    pub fn health(&self) -> Health {
        Health {
            name: self.name.clone(),
            initialized: self.initialized,
            running: self.running,
            started_at: self.started_at,
            uptime_secs: self
                .running
                .then(|| self.uptime().map(|d| d.as_secs()))
                .flatten(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> Hook) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for_hooks = log.clone();
        let make = move |label: &'static str| {
            let log = log_for_hooks.clone();
            boxed(move || async move {
                log.lock().unwrap().push(label);
                Ok(())
            })
        };
        (log, make)
    }

    fn with_hooks(make: &impl Fn(&'static str) -> Hook) -> Lifecycle {
        let mut lifecycle = Lifecycle::new("test");
        lifecycle.init = Some(make("init"));
        lifecycle.start = Some(make("start"));
        lifecycle.stop = Some(make("stop"));
        lifecycle
    }

    #[tokio::test]
    async fn test_start_initializes_first() {
        let (log, make) = recorder();
        let mut lifecycle = with_hooks(&make);

        lifecycle.start().await.unwrap();
        assert!(lifecycle.is_initialized());
        assert!(lifecycle.is_running());
        assert!(lifecycle.health().started_at.is_some());
        assert_eq!(*log.lock().unwrap(), vec!["init", "start"]);
    }

    #[tokio::test]
    async fn test_initialize_runs_once() {
        let (log, make) = recorder();
        let mut lifecycle = with_hooks(&make);

        lifecycle.initialize().await.unwrap();
        lifecycle.initialize().await.unwrap();
        lifecycle.start().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["init", "start"]);
    }

    #[tokio::test]
    async fn test_stop_when_not_running_is_noop() {
        let (log, make) = recorder();
        let mut lifecycle = with_hooks(&make);

        lifecycle.stop().await.unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_after_start() {
        let (log, make) = recorder();
        with_hooks(&make).run().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["init", "start", "stop"]);
    }

    #[tokio::test]
    async fn test_init_failure_skips_start() {
        let started = Arc::new(Mutex::new(false));
        let flag = started.clone();
        let result = Lifecycle::new("broken")
            .on_init(|| async { Err(anyhow::anyhow!("no config")) })
            .on_start(move || async move {
                *flag.lock().unwrap() = true;
                Ok(())
            })
            .run()
            .await;

        assert_eq!(result.unwrap_err().to_string(), "no config");
        assert!(!*started.lock().unwrap());
    }

    #[tokio::test]
    async fn test_serve_error_still_stops() {
        let stopped = Arc::new(Mutex::new(false));
        let flag = stopped.clone();
        let result = Lifecycle::new("flaky")
            .on_start(|| async { Err(anyhow::anyhow!("listener died")) })
            .on_stop(move || async move {
                *flag.lock().unwrap() = true;
                Ok(())
            })
            .run()
            .await;

        assert_eq!(result.unwrap_err().to_string(), "listener died");
        assert!(*stopped.lock().unwrap());
    }

    #[test]
    fn test_health_before_start() {
        let health = Lifecycle::new("idle").health();
        assert!(!health.initialized);
        assert!(!health.running);
        assert!(health.uptime_secs.is_none());
    }
}
