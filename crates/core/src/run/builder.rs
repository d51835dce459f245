use std::{future::Future, num::NonZeroUsize, sync::Arc};

use futures::{FutureExt, TryFutureExt};
use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    action::Action,
    arguments::{Arguments, Parameter, Resolver, Resolvers},
    error::{BoxError, StructuralError},
    interceptor::{Chain, Interceptor},
    producer::Produced,
    types::RunConfig,
};

use super::{EntryFn, Run};

/// Declares a [`Run`]. Shape errors surface from [`RunBuilder::build`].
pub struct RunBuilder {
    config: RunConfig,
    entry: Option<Arc<EntryFn>>,
    parameters: Vec<Parameter>,
    resolvers: Resolvers,
    actions: Vec<Action>,
    default_action: Option<String>,
    interceptors: Chain,
}

impl RunBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: RunConfig::new(name),
            entry: None,
            parameters: Vec::new(),
            resolvers: Resolvers::default(),
            actions: Vec::new(),
            default_action: None,
            interceptors: Chain::new(),
        }
    }

    /// Replaces the whole configuration, name included.
    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn return_exceptions(mut self, enabled: bool) -> Self {
        self.config.return_exceptions = enabled;
        self
    }

    pub fn protected_items(mut self, enabled: bool) -> Self {
        self.config.protected_items = enabled;
        self
    }

    pub fn max_concurrency(mut self, limit: NonZeroUsize) -> Self {
        self.config.max_concurrency = Some(limit);
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.parameters.push(Parameter::with_default(name, default));
        self
    }

    pub fn required_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(Parameter::required(name));
        self
    }

    /// Registers the run-level resolver for `parameter`.
    pub fn argument<F>(mut self, parameter: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.resolvers.insert(Resolver::new(parameter, transform));
        self
    }

    pub fn argument_async<F, Fut>(mut self, parameter: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        self.resolvers.insert(Resolver::from_async(parameter, transform));
        self
    }

    /// Sets the function that produces the run's items. It receives the
    /// run-level arguments and runs inside the run's root context.
    pub fn entry<F, Fut, P>(mut self, entry: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<P, BoxError>> + Send + 'static,
        P: Into<Produced> + 'static,
    {
        let entry: Arc<EntryFn> = Arc::new(move |arguments: Arguments| {
            entry(arguments).map_ok(Into::<Produced>::into).boxed()
        });
        self.entry = Some(entry);
        self
    }

    /// Registers an action. The first one registered is the default unless
    /// [`RunBuilder::default_action`] picks another.
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn default_action(mut self, action: Action) -> Self {
        self.default_action = Some(action.name().to_string());
        self.actions.push(action);
        self
    }

    /// Adds a run-wide interceptor. Run-wide interceptors are the outermost
    /// layers of every item's chain.
    pub fn interceptor<I>(mut self, interceptor: I) -> Self
    where
        I: Interceptor + 'static,
    {
        self.interceptors = self.interceptors.with(interceptor);
        self
    }

    pub fn interceptor_shared(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors = self.interceptors.with_shared(interceptor);
        self
    }

    pub fn build(self) -> Result<Run, StructuralError> {
        let entry = self
            .entry
            .ok_or_else(|| StructuralError::MissingEntry(self.config.name.clone()))?;

        for name in self.resolvers.names() {
            if !self.parameters.iter().any(|parameter| parameter.name() == name) {
                return Err(StructuralError::UnknownParameter {
                    owner: format!("run `{}`", self.config.name),
                    parameter: name.to_string(),
                });
            }
        }

        let mut actions = IndexMap::with_capacity(self.actions.len());
        for action in self.actions {
            action.validate()?;
            let name = action.name().to_string();
            if actions.insert(name.clone(), Arc::new(action)).is_some() {
                return Err(StructuralError::DuplicateAction(name));
            }
        }
        let default_action = self
            .default_action
            .or_else(|| actions.keys().next().cloned());

        Ok(Run {
            config: self.config,
            entry,
            parameters: self.parameters,
            resolvers: self.resolvers,
            actions,
            default_action,
            interceptors: self.interceptors,
        })
    }
}

impl std::fmt::Debug for RunBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunBuilder")
            .field("config", &self.config)
            .field("has_entry", &self.entry.is_some())
            .field("parameters", &self.parameters)
            .field("actions", &self.actions.len())
            .finish_non_exhaustive()
    }
}
