use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, join_all};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;

pub(crate) type CompletionTask = BoxFuture<'static, Result<(), BoxError>>;

/// Run-wide bookkeeping that is not key/value data: the override slot,
/// deferred completion tasks and cancellation.
pub(crate) struct RunState {
    name: String,
    override_value: Mutex<Option<Value>>,
    completions: Mutex<Vec<CompletionTask>>,
    cancel: CancellationToken,
}

impl RunState {
    pub(crate) fn new(name: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            name: name.into(),
            override_value: Mutex::new(None),
            completions: Mutex::new(Vec::new()),
            cancel,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Last write wins.
    pub(crate) fn set_override(&self, value: Value) {
        let previous = lock(&self.override_value).replace(value);
        if previous.is_some() {
            tracing::debug!(run = %self.name, "override replaced");
        } else {
            tracing::debug!(run = %self.name, "override set");
        }
    }

    pub(crate) fn take_override(&self) -> Option<Value> {
        lock(&self.override_value).take()
    }

    pub(crate) fn push_completion(&self, task: CompletionTask) {
        lock(&self.completions).push(task);
    }

    /// Runs every registered task concurrently. Tasks registered while
    /// these run are picked up in a further round.
    pub(crate) async fn run_completions(&self) {
        loop {
            let tasks = std::mem::take(&mut *lock(&self.completions));
            if tasks.is_empty() {
                return;
            }

            tracing::debug!(run = %self.name, count = tasks.len(), "running completion tasks");
            for result in join_all(tasks).await {
                if let Err(error) = result {
                    tracing::warn!(run = %self.name, %error, "completion task failed");
                }
            }
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
