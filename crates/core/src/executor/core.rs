use std::sync::Arc;

use futures::{FutureExt, StreamExt, future::BoxFuture};
use indexmap::IndexMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    action::Action,
    arguments::{Arguments, seed},
    context::{Context, ITEM_KEY, RunState},
    error::{Error, ItemError, StructuralError},
    interceptor::{Activation, Terminal},
    mode::{Dispatch, Mode, classify},
    producer::{ItemStream, ProducerStream},
    run::{Invocation, Run},
    types::Item,
};

use super::{Outcome, RunResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    Classify,
    Dispatch,
    Collect,
    Finalize,
    Done,
    Aborted,
}

/// Drives one invocation of a [`Run`] from argument validation to the final
/// result.
pub struct Coordinator<'r> {
    run: &'r Run,
    action: Arc<Action>,
    supplied: Arc<IndexMap<String, Value>>,
    state: Arc<RunState>,
    root: Context,
    phase: RunPhase,
}

impl<'r> Coordinator<'r> {
    /// Validates the invocation against the run's declarations and prepares
    /// the root context. Nothing user-defined runs yet.
    pub fn new(run: &'r Run, invocation: Invocation) -> Result<Self, StructuralError> {
        let Invocation {
            arguments,
            action,
            cancel,
        } = invocation;

        let action = Arc::clone(run.action(action.as_deref())?);
        if let Some(name) = arguments
            .keys()
            .find(|name| !run.declares(name) && !action.declares(name))
        {
            return Err(StructuralError::UnexpectedArgument(name.clone()));
        }
        for parameter in run.parameters() {
            let bound = seed(parameter, &arguments).is_some()
                || run.resolvers().contains(parameter.name());
            if !bound {
                return Err(StructuralError::MissingArgument {
                    owner: format!("run `{}`", run.name()),
                    parameter: parameter.name().to_string(),
                });
            }
        }

        let cancel = cancel.map_or_else(CancellationToken::new, |token| token.child_token());
        let state = Arc::new(RunState::new(run.name(), cancel));
        let root = Context::root(Arc::clone(&state));

        Ok(Self {
            run,
            action,
            supplied: Arc::new(arguments),
            state,
            root,
            phase: RunPhase::Init,
        })
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub async fn execute(mut self) -> Result<RunResult, Error> {
        let root = self.root.clone();
        let state = Arc::clone(&self.state);
        let result = root
            .scope(async {
                let result = self.drive().await;
                if result.is_err() {
                    // Tasks registered before the abort still run.
                    state.run_completions().await;
                }
                result
            })
            .await;
        if result.is_err() && self.phase != RunPhase::Done {
            self.enter(RunPhase::Aborted);
        }
        result
    }

    async fn drive(&mut self) -> Result<RunResult, Error> {
        tracing::info!(run = %self.run.name(), action = %self.action.name(), "run started");

        let base = Activation::open(&self.root, self.run.interceptors().clone());
        let run_arguments = Arc::new(self.resolve_run_arguments().await?);
        self.action.check_bindings(&run_arguments, &self.supplied)?;

        let produced = self
            .run
            .call_entry(Arguments::clone(&run_arguments))
            .await
            .map_err(|source| StructuralError::EntryFailed {
                run: self.run.name().to_string(),
                source,
            })?;
        let (source, held) = produced.into_parts();

        self.enter(RunPhase::Classify);
        let dispatch = classify(source, self.run.config().protected_items)
            .await
            .map_err(|source| StructuralError::ProducerFailed {
                run: self.run.name().to_string(),
                dispatched: 0,
                source,
            })?;
        let mode = dispatch.mode();
        tracing::info!(run = %self.run.name(), ?mode, "mode selected");

        self.enter(RunPhase::Dispatch);
        let dispatcher = Dispatcher::new(self, run_arguments);
        let dispatched = match dispatch {
            Dispatch::Parallel(items) => {
                Ok(RunResult::Batch(self.parallel(&dispatcher, items).await))
            }
            Dispatch::Sequential(producer) => self
                .sequential(&dispatcher, producer)
                .await
                .map(RunResult::Batch),
            Dispatch::Single(value) => Ok(RunResult::Single(dispatcher.dispatch(0, value).await)),
        };

        self.enter(RunPhase::Collect);
        drop(held);
        drop(base);
        self.state.run_completions().await;
        let result = dispatched?;

        self.enter(RunPhase::Finalize);
        let result = self.finalize(mode, result);
        self.enter(RunPhase::Done);
        result
    }

    /// Run stage of argument resolution. Each value is also published into
    /// the root context under the parameter's name.
    async fn resolve_run_arguments(&self) -> Result<Arguments, Error> {
        let mut resolved = Arguments::new();
        for parameter in self.run.parameters() {
            let name = parameter.name();
            let seeded = seed(parameter, &self.supplied).unwrap_or(Value::Null);
            let value = self.run.resolvers().apply(name, seeded).await?;
            self.root.set_run(name, value.clone());
            resolved.insert(name, value);
        }
        Ok(resolved)
    }

    async fn parallel(&self, dispatcher: &Dispatcher, items: ItemStream) -> Vec<Outcome> {
        let limit = self.run.config().concurrency_limit();
        let mut outcomes: Vec<Outcome> = items
            .take_until(self.state.cancellation().clone().cancelled_owned())
            .enumerate()
            .map(|(index, value)| dispatcher.dispatch(index, value))
            .buffer_unordered(limit)
            .collect()
            .await;
        outcomes.sort_by_key(|outcome| outcome.index);
        outcomes
    }

    /// Pulls the next value only once the previous item has settled. An
    /// intolerant run stops pulling after the first failure.
    async fn sequential(
        &self,
        dispatcher: &Dispatcher,
        mut producer: ProducerStream,
    ) -> Result<Vec<Outcome>, StructuralError> {
        let cancel = self.state.cancellation();
        let mut outcomes = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = producer.next() => next,
            };
            let value = match next {
                Some(Ok(value)) => value,
                Some(Err(source)) => {
                    return Err(StructuralError::ProducerFailed {
                        run: self.run.name().to_string(),
                        dispatched: outcomes.len(),
                        source,
                    });
                }
                None => break,
            };

            let outcome = dispatcher.dispatch(outcomes.len(), value).await;
            let stop = outcome.is_failure() && !self.run.config().return_exceptions;
            outcomes.push(outcome);
            if stop {
                tracing::debug!(run = %self.run.name(), "stopping producer after failure");
                break;
            }
        }

        Ok(outcomes)
    }

    fn finalize(&self, mode: Mode, result: RunResult) -> Result<RunResult, Error> {
        let failed = result.failures().count();
        tracing::info!(
            run = %self.run.name(),
            ?mode,
            items = result.len(),
            failed,
            "run finished"
        );

        let result = if self.run.config().return_exceptions {
            for outcome in result.failures() {
                if let Some(error) = outcome.error() {
                    tracing::warn!(run = %self.run.name(), index = outcome.index, %error, "item failed");
                }
            }
            result
        } else {
            result.raise_first_failure()?
        };

        match self.state.take_override() {
            Some(value) => {
                tracing::debug!(run = %self.run.name(), "result overridden");
                Ok(RunResult::Overridden(value))
            }
            None => Ok(result),
        }
    }

    fn enter(&mut self, phase: RunPhase) {
        tracing::debug!(run = %self.run.name(), from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }
}

/// Builds the future of one item: child scope, interceptor snapshot, then
/// argument resolution and the action call at the end of the chain.
struct Dispatcher {
    run_name: String,
    root: Context,
    state: Arc<RunState>,
    terminal: Arc<Terminal>,
}

impl Dispatcher {
    fn new(coordinator: &Coordinator<'_>, run_arguments: Arc<Arguments>) -> Self {
        let action = Arc::clone(&coordinator.action);
        let supplied = Arc::clone(&coordinator.supplied);
        let terminal: Arc<Terminal> = Arc::new(move |item: Item| {
            call_action(
                Arc::clone(&action),
                Arc::clone(&run_arguments),
                Arc::clone(&supplied),
                item,
            )
        });

        Self {
            run_name: coordinator.run.name().to_string(),
            root: coordinator.root.clone(),
            state: Arc::clone(&coordinator.state),
            terminal,
        }
    }

    fn dispatch(&self, index: usize, value: Value) -> BoxFuture<'static, Outcome> {
        let scope = self.root.child();
        let chain = scope.interceptors().snapshot();
        scope.set(ITEM_KEY, value.clone());

        let item = Item::new(index, value);
        let terminal = Arc::clone(&self.terminal);
        let cancel = self.state.cancellation().clone();
        let span = tracing::debug_span!("item", run = %self.run_name, index);

        async move {
            let call = scope.scope(async { chain.invoke(&item, terminal.as_ref()).await });
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ItemError::Cancelled),
                result = call => result,
            };
            match &result {
                Ok(_) => tracing::debug!("item settled"),
                Err(error) => tracing::debug!(%error, "item failed"),
            }
            Outcome::new(index, result)
        }
        .instrument(span)
        .boxed()
    }
}

fn call_action(
    action: Arc<Action>,
    run_arguments: Arc<Arguments>,
    supplied: Arc<IndexMap<String, Value>>,
    item: Item,
) -> BoxFuture<'static, Result<Value, ItemError>> {
    async move {
        let arguments = action.resolve(&run_arguments, &supplied).await?;
        action.call(item.into_value(), arguments).await
    }
    .boxed()
}
