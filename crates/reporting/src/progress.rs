use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use plex_core::{Interceptor, Item, ItemError, Next};
use serde::Serialize;
use serde_json::Value;

const DEFAULT_LABEL: &str = "items";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub settled: usize,
    pub failed: usize,
}

impl ProgressSnapshot {
    pub fn succeeded(&self) -> usize {
        self.settled.saturating_sub(self.failed)
    }

    pub fn is_complete(&self) -> bool {
        self.settled >= self.total
    }
}

/// Counts settled items against an expected total and logs each step.
///
/// Outcomes pass through untouched. Share one instance through an `Arc` to
/// read [`Progress::snapshot`] after the run.
#[derive(Debug)]
pub struct Progress {
    label: String,
    total: usize,
    settled: AtomicUsize,
    failed: AtomicUsize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self::labelled(DEFAULT_LABEL, total)
    }

    pub fn labelled(label: impl Into<String>, total: usize) -> Self {
        Self {
            label: label.into(),
            total,
            settled: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            settled: self.settled.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    fn record(&self, index: usize, result: &Result<Value, ItemError>) {
        let settled = self.settled.fetch_add(1, Ordering::SeqCst) + 1;
        if let Err(error) = result {
            self.failed.fetch_add(1, Ordering::SeqCst);
            tracing::warn!(label = %self.label, index, %error, "item failed");
        }
        tracing::info!(label = %self.label, "{settled}/{}", self.total);
    }
}

#[async_trait]
impl Interceptor for Progress {
    async fn process_item(&self, item: &Item, next: Next<'_>) -> Result<Value, ItemError> {
        let result = next.run(item).await;
        self.record(item.index(), &result);
        result
    }

    fn activated(&self) {
        tracing::info!(label = %self.label, total = self.total, "processing started");
    }

    fn deactivated(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            label = %self.label,
            settled = snapshot.settled,
            failed = snapshot.failed,
            total = snapshot.total,
            "processing finished"
        );
    }
}
