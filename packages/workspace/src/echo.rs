//! Echo suppression for the session's own disk writes

use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Sync state of one project file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileState {
    /// Disk, session and clients agree
    Clean,
    /// Written by this session; the watcher's notification is our own echo
    PendingEcho,
    /// The session holds content the disk does not have yet
    Dirty,
}

/// filename → expiry of its echo window
#[derive(Debug)]
pub struct EchoSuppressor {
    window: Duration,
    pending: HashMap<String, Instant>,
}

impl EchoSuppressor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Start (or restart) the echo window for `filename`
    pub fn mark(&mut self, filename: &str) {
        self.pending.insert(filename.to_string(), Instant::now() + self.window);
    }

    /// Whether a change notification for `filename` is our own write.
    /// Expired entries are pruned first.
    pub fn is_echo(&mut self, filename: &str) -> bool {
        self.prune();
        self.pending.contains_key(filename)
    }

    pub fn is_pending(&self, filename: &str) -> bool {
        self.pending
            .get(filename)
            .is_some_and(|expiry| *expiry > Instant::now())
    }

    pub fn forget(&mut self, filename: &str) {
        self.pending.remove(filename);
    }

    pub fn prune(&mut self) {
        let now = Instant::now();
        self.pending.retain(|_, expiry| *expiry > now);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_echo_within_window() {
        let mut echo = EchoSuppressor::new(Duration::from_millis(500));
        echo.mark("a.js");

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(echo.is_echo("a.js"));
        assert!(echo.is_echo("a.js"));
        assert!(!echo.is_echo("b.js"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_pruned() {
        let mut echo = EchoSuppressor::new(Duration::from_millis(500));
        echo.mark("a.js");

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(!echo.is_pending("a.js"));
        assert!(!echo.is_echo("a.js"));
        assert!(echo.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_restarts_window() {
        let mut echo = EchoSuppressor::new(Duration::from_millis(500));
        echo.mark("a.js");
        tokio::time::advance(Duration::from_millis(400)).await;
        echo.mark("a.js");
        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(echo.is_echo("a.js"));
    }
}
