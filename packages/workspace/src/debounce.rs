use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::mpsc;

/// Coalesces bursts of change notifications into one batch
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    quiet: Duration,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self { quiet }
    }

    /// Wait for the next change, then keep collecting until no further
    /// change arrives for the quiet period. `None` once the sender is gone.
    pub async fn next_batch(&self, rx: &mut mpsc::Receiver<String>) -> Option<BTreeSet<String>> {
        let first = rx.recv().await?;
        let mut batch = BTreeSet::from([first]);

        loop {
            match tokio::time::timeout(self.quiet, rx.recv()).await {
                Ok(Some(filename)) => {
                    batch.insert(filename);
                }
                Ok(None) | Err(_) => break,
            }
        }
        Some(batch)
    }
}
