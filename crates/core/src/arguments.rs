//! Named-argument resolution.
//!
//! A parameter's value starts as the invocation's keyword value (or the
//! declared default), then passes through the run-level resolver and then
//! through each action-level resolver, outermost action first. A stage with
//! no resolver for the name passes the value through unchanged.

use std::{future::Future, sync::Arc};

use futures::{FutureExt, future::BoxFuture};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ArgumentError, BoxError, ResolutionError};

pub type ResolverFn = dyn Fn(Value) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    default: Option<Value>,
}

impl Parameter {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// Transform bound to one parameter name at one stage.
#[derive(Clone)]
pub struct Resolver {
    parameter: String,
    transform: Arc<ResolverFn>,
}

impl Resolver {
    pub fn new<F>(parameter: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            parameter: parameter.into(),
            transform: Arc::new(move |value| futures::future::ready(transform(value)).boxed()),
        }
    }

    pub fn from_async<F, Fut>(parameter: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self {
            parameter: parameter.into(),
            transform: Arc::new(move |value| transform(value).boxed()),
        }
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    pub async fn apply(&self, value: Value) -> Result<Value, ResolutionError> {
        (self.transform)(value)
            .await
            .map_err(|source| ResolutionError {
                parameter: self.parameter.clone(),
                source,
            })
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("parameter", &self.parameter)
            .finish_non_exhaustive()
    }
}

/// The resolvers of one stage (a run or one action), keyed by parameter.
#[derive(Debug, Clone, Default)]
pub struct Resolvers {
    by_name: IndexMap<String, Resolver>,
}

impl Resolvers {
    /// Registers `resolver`, replacing an earlier one for the same name.
    pub fn insert(&mut self, resolver: Resolver) -> Option<Resolver> {
        self.by_name.insert(resolver.parameter.clone(), resolver)
    }

    pub fn get(&self, parameter: &str) -> Option<&Resolver> {
        self.by_name.get(parameter)
    }

    pub fn contains(&self, parameter: &str) -> bool {
        self.by_name.contains_key(parameter)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub async fn apply(&self, parameter: &str, value: Value) -> Result<Value, ResolutionError> {
        match self.by_name.get(parameter) {
            Some(resolver) => resolver.apply(value).await,
            None => Ok(value),
        }
    }
}

/// Resolved name → value pairs handed to an entry or action.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: IndexMap<String, Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_as<T>(&self, name: &str) -> Result<T, ArgumentError>
    where
        T: DeserializeOwned,
    {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| ArgumentError::Missing(name.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|source| ArgumentError::Decode {
            name: name.to_string(),
            source,
        })
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for Arguments {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Seed value of a parameter before any resolver runs: the keyword value,
/// else the declared default.
pub(crate) fn seed(parameter: &Parameter, supplied: &IndexMap<String, Value>) -> Option<Value> {
    supplied
        .get(parameter.name())
        .or(parameter.default())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_resolver_passes_through() {
        let resolvers = Resolvers::default();
        let value = resolvers
            .apply("anything", json!(3))
            .await
            .expect("passthrough");
        assert_eq!(value, json!(3));
    }

    #[tokio::test]
    async fn later_registration_replaces_earlier() {
        let mut resolvers = Resolvers::default();
        resolvers.insert(Resolver::new("n", |_| Ok(json!("first"))));
        let replaced = resolvers.insert(Resolver::new("n", |_| Ok(json!("second"))));

        assert!(replaced.is_some());
        assert_eq!(resolvers.apply("n", Value::Null).await.expect("ok"), json!("second"));
    }

    #[tokio::test]
    async fn async_resolver_failure_names_the_parameter() {
        let resolver = Resolver::from_async("limit", |_| async {
            Err::<Value, _>(BoxError::from("not a number"))
        });
        let error = resolver.apply(json!("x")).await.expect_err("should fail");

        assert_eq!(error.parameter, "limit");
        assert_eq!(error.source.to_string(), "not a number");
    }

    #[test]
    fn seed_prefers_keyword_over_default() {
        let parameter = Parameter::with_default("multiplier", 2);
        let mut supplied = IndexMap::new();
        assert_eq!(seed(&parameter, &supplied), Some(json!(2)));

        supplied.insert("multiplier".to_string(), json!(3));
        assert_eq!(seed(&parameter, &supplied), Some(json!(3)));

        assert_eq!(seed(&Parameter::required("other"), &supplied), None);
    }

    #[test]
    fn get_as_decodes_or_reports_shape() {
        let mut arguments = Arguments::new();
        arguments.insert("count", 4);
        arguments.insert("label", "four");

        assert_eq!(arguments.get_as::<u32>("count").expect("decodes"), 4);
        assert!(matches!(
            arguments.get_as::<u32>("label"),
            Err(ArgumentError::Decode { .. })
        ));
        assert!(matches!(
            arguments.get_as::<u32>("absent"),
            Err(ArgumentError::Missing(_))
        ));
    }
}
