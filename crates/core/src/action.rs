use std::{future::Future, sync::Arc};

use futures::{FutureExt, future::BoxFuture};
use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    arguments::{Arguments, Parameter, Resolver, Resolvers, seed},
    error::{BoxError, ItemError, ResolutionError, StructuralError},
};

pub type HandlerFn =
    dyn Fn(Value, Arguments) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync;

/// A named per-item processing step.
///
/// An action either owns a handler or wraps another action. Wrapping adds a
/// resolver stage (applied before the inner action's) and extra parameter
/// declarations, but the item still reaches exactly one handler.
#[derive(Clone)]
pub struct Action {
    name: String,
    parameters: Vec<Parameter>,
    resolvers: Resolvers,
    body: Body,
}

#[derive(Clone)]
enum Body {
    Handler(Arc<HandlerFn>),
    Nested(Box<Action>),
}

impl Action {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            resolvers: Resolvers::default(),
            body: Body::Handler(Arc::new(move |item, arguments| {
                handler(item, arguments).boxed()
            })),
        }
    }

    pub fn wrapping(name: impl Into<String>, inner: Action) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            resolvers: Resolvers::default(),
            body: Body::Nested(Box::new(inner)),
        }
    }

    /// Declares a parameter without a default. Its value must come from the
    /// run, the invocation, or a resolver.
    pub fn parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.push(Parameter::required(name));
        self
    }

    pub fn parameter_with_default(
        mut self,
        name: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        self.parameters.push(Parameter::with_default(name, default));
        self
    }

    /// Registers an action-level resolver. It receives the run-level value.
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

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the action whose handler actually runs.
    pub fn handler_name(&self) -> &str {
        self.handler().0
    }

    /// All parameters across the nesting. An inner declaration replaces an
    /// outer one with the same name.
    pub fn parameters(&self) -> Vec<&Parameter> {
        let mut merged: IndexMap<&str, &Parameter> = IndexMap::new();
        for action in self.layers() {
            for parameter in &action.parameters {
                merged.insert(parameter.name(), parameter);
            }
        }
        merged.into_values().collect()
    }

    /// Every resolver references a declared parameter.
    pub(crate) fn validate(&self) -> Result<(), StructuralError> {
        let parameters = self.parameters();
        for action in self.layers() {
            for name in action.resolvers.names() {
                if !parameters.iter().any(|parameter| parameter.name() == name) {
                    return Err(StructuralError::UnknownParameter {
                        owner: format!("action `{}`", action.name),
                        parameter: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Every parameter has some source of value for this invocation.
    pub(crate) fn check_bindings(
        &self,
        run_arguments: &Arguments,
        supplied: &IndexMap<String, Value>,
    ) -> Result<(), StructuralError> {
        for parameter in self.parameters() {
            let name = parameter.name();
            let bound = run_arguments.contains(name)
                || seed(parameter, supplied).is_some()
                || self.layers().any(|action| action.resolvers.contains(name));
            if !bound {
                return Err(StructuralError::MissingArgument {
                    owner: format!("action `{}`", self.name),
                    parameter: name.to_string(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn declares(&self, name: &str) -> bool {
        self.parameters()
            .iter()
            .any(|parameter| parameter.name() == name)
    }

    /// Resolves the action-level value of every parameter. Run-level values
    /// take precedence as the seed; each action stage then applies in turn,
    /// outermost first.
    pub(crate) async fn resolve(
        &self,
        run_arguments: &Arguments,
        supplied: &IndexMap<String, Value>,
    ) -> Result<Arguments, ResolutionError> {
        let mut resolved = Arguments::new();
        for parameter in self.parameters() {
            let name = parameter.name();
            let mut value = run_arguments
                .get(name)
                .cloned()
                .or_else(|| seed(parameter, supplied))
                .unwrap_or(Value::Null);
            for action in self.layers() {
                value = action.resolvers.apply(name, value).await?;
            }
            resolved.insert(name, value);
        }
        Ok(resolved)
    }

    pub(crate) async fn call(&self, item: Value, arguments: Arguments) -> Result<Value, ItemError> {
        let (name, handler) = self.handler();
        handler(item, arguments)
            .await
            .map_err(|source| ItemError::Action {
                action: name.to_string(),
                source,
            })
    }

    fn layers(&self) -> impl Iterator<Item = &Action> {
        std::iter::successors(Some(self), |action| match &action.body {
            Body::Nested(inner) => Some(&**inner),
            Body::Handler(_) => None,
        })
    }

    fn handler(&self) -> (&str, &Arc<HandlerFn>) {
        let mut action = self;
        loop {
            match &action.body {
                Body::Handler(handler) => return (action.name.as_str(), handler),
                Body::Nested(inner) => action = &**inner,
            }
        }
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("resolvers", &self.resolvers)
            .field("nested", &matches!(self.body, Body::Nested(_)))
            .finish()
    }
}
