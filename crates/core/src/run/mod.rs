pub mod builder;
pub mod invocation;

use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;

use crate::{
    action::Action,
    arguments::{Arguments, Parameter, Resolvers},
    error::{BoxError, Error, StructuralError},
    executor::{Coordinator, RunResult},
    interceptor::Chain,
    producer::Produced,
    types::RunConfig,
};

pub use builder::RunBuilder;
pub use invocation::Invocation;

pub type EntryFn = dyn Fn(Arguments) -> BoxFuture<'static, Result<Produced, BoxError>> + Send + Sync;

/// A declared unit of work: an entry that produces items, the actions that
/// process them, run-level argument rules and run-wide interceptors.
///
/// A `Run` is immutable once built and can be invoked any number of times;
/// every invocation gets a fresh root context.
pub struct Run {
    config: RunConfig,
    entry: Arc<EntryFn>,
    parameters: Vec<Parameter>,
    resolvers: Resolvers,
    actions: IndexMap<String, Arc<Action>>,
    default_action: Option<String>,
    interceptors: Chain,
}

impl Run {
    pub fn builder(name: impl Into<String>) -> RunBuilder {
        RunBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn resolvers(&self) -> &Resolvers {
        &self.resolvers
    }

    pub fn interceptors(&self) -> &Chain {
        &self.interceptors
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn declares(&self, parameter: &str) -> bool {
        self.parameters
            .iter()
            .any(|declared| declared.name() == parameter)
    }

    /// Looks up `name`, or the default action when `None`.
    pub fn action(&self, name: Option<&str>) -> Result<&Arc<Action>, StructuralError> {
        match name {
            Some(name) => self
                .actions
                .get(name)
                .ok_or_else(|| StructuralError::UnknownAction(name.to_string())),
            None => self
                .default_action
                .as_deref()
                .and_then(|name| self.actions.get(name))
                .ok_or_else(|| StructuralError::NoAction(self.name().to_string())),
        }
    }

    pub async fn invoke(&self, invocation: Invocation) -> Result<RunResult, Error> {
        Coordinator::new(self, invocation)?.execute().await
    }

    /// Invokes the run with no keyword arguments.
    pub async fn run(&self) -> Result<RunResult, Error> {
        self.invoke(Invocation::new()).await
    }

    /// Invokes the run on a fresh single-threaded runtime, blocking the
    /// caller until the result is ready. Must not be called from inside
    /// another runtime.
    pub fn run_blocking(&self, invocation: Invocation) -> Result<RunResult, Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StructuralError::Runtime)?;
        runtime.block_on(self.invoke(invocation))
    }

    pub(crate) async fn call_entry(&self, arguments: Arguments) -> Result<Produced, BoxError> {
        (self.entry)(arguments).await
    }
}

impl std::fmt::Debug for Run {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Run")
            .field("config", &self.config)
            .field("parameters", &self.parameters)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("default_action", &self.default_action)
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}
