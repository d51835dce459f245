//! Ambient, two-tier key/value context.
//!
//! Every run owns a root scope; every item gets a child scope that reads
//! through to the root. The active scope is carried in task-local storage, so
//! code anywhere inside an item's call stack can reach it with [`current`].

mod scope;
mod state;

use std::{future::Future, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{BoxError, ContextError},
    interceptor::InterceptorStack,
};

use scope::Scope;
pub(crate) use state::{RunState, lock};

/// Reserved root entry holding the owning run's name.
pub const RUN_KEY: &str = "_run";
/// Item scopes publish the item value under this key.
pub const ITEM_KEY: &str = "item";

tokio::task_local! {
    static CURRENT: Context;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Run,
    Item,
}

/// Handle to the active scope plus the run it belongs to. Cheap to clone.
///
/// Each scope also owns its active interceptors. A child starts from the
/// interceptors its parent had active when the child was opened.
#[derive(Clone)]
pub struct Context {
    scope: Arc<Scope>,
    run: Arc<RunState>,
    interceptors: Arc<InterceptorStack>,
}

impl Context {
    pub(crate) fn root(run: Arc<RunState>) -> Self {
        let scope = Scope::root();
        scope.insert(RUN_KEY.to_string(), Value::String(run.name().to_string()));
        Self {
            scope: Arc::new(scope),
            run,
            interceptors: Arc::default(),
        }
    }

    /// The context of the run executing in the current task.
    pub fn current() -> Result<Self, ContextError> {
        CURRENT.try_with(Clone::clone).map_err(|_| ContextError::NotInRun)
    }

    pub fn try_current() -> Option<Self> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// Opens a child scope. It becomes ambient only inside [`Context::scope`].
    pub fn child(&self) -> Self {
        Self {
            scope: Arc::new(Scope::child(Arc::clone(&self.scope))),
            run: Arc::clone(&self.run),
            interceptors: Arc::new(InterceptorStack::inherit(&self.interceptors.snapshot())),
        }
    }

    /// Runs `future` with this context as the ambient one.
    pub async fn scope<F>(self, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(self, future).await
    }

    pub fn kind(&self) -> ScopeKind {
        if self.scope.is_root() {
            ScopeKind::Run
        } else {
            ScopeKind::Item
        }
    }

    pub fn run_name(&self) -> &str {
        self.run.name()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.scope.lookup(key)
    }

    /// Reads and decodes a value. `None` when absent or of another shape.
    pub fn get_as<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.scope.contains(key)
    }

    /// Writes into the innermost scope.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.scope.insert(key.into(), value.into())
    }

    /// Writes into the run-wide root scope, visible to every item that does
    /// not shadow the key.
    pub fn set_run(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.root_scope().insert(key.into(), value.into())
    }

    /// Removes a key from the innermost scope only.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.scope.remove(key)
    }

    /// Keys written directly into the innermost scope.
    pub fn local_keys(&self) -> Vec<String> {
        self.scope.local_keys()
    }

    /// Replaces the run's final result. Does not stop other items.
    pub fn override_result(&self, value: impl Into<Value>) {
        self.run.set_override(value.into());
    }

    /// Registers a task that runs once every item has settled.
    pub fn on_complete<F>(&self, task: F)
    where
        F: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.run.push_completion(Box::pin(task));
    }

    /// Cancellation signal of the run, for cooperative checks in long items.
    pub fn cancellation(&self) -> CancellationToken {
        self.run.cancellation().clone()
    }

    pub(crate) fn run_state(&self) -> &Arc<RunState> {
        &self.run
    }

    pub(crate) fn interceptors(&self) -> &Arc<InterceptorStack> {
        &self.interceptors
    }

    fn root_scope(&self) -> &Scope {
        let mut scope = self.scope.as_ref();
        while let Some(parent) = scope.parent() {
            scope = parent;
        }
        scope
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("run", &self.run.name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// The ambient context of the current run.
pub fn current() -> Result<Context, ContextError> {
    Context::current()
}

/// Replaces the current run's final result; the last call wins.
pub fn override_result(value: impl Into<Value>) -> Result<(), ContextError> {
    Context::current()?.override_result(value);
    Ok(())
}
