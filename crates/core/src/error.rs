use thiserror::Error;

/// Error type returned by user code: entries, actions and argument resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("item {index} failed: {source}")]
    Item {
        index: usize,
        #[source]
        source: ItemError,
    },

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl Error {
    /// Index of the failed item, when the error came from item processing.
    pub fn item_index(&self) -> Option<usize> {
        match self {
            Self::Item { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Faults that abort a run before (or instead of) dispatching items. These are
/// raised regardless of `return_exceptions`.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("run `{0}` has no entry")]
    MissingEntry(String),

    #[error("entry of run `{run}` failed: {source}")]
    EntryFailed {
        run: String,
        #[source]
        source: BoxError,
    },

    #[error("producer of run `{run}` failed after {dispatched} items: {source}")]
    ProducerFailed {
        run: String,
        dispatched: usize,
        #[source]
        source: BoxError,
    },

    #[error("argument resolver on {owner} references unknown parameter `{parameter}`")]
    UnknownParameter { owner: String, parameter: String },

    #[error("no value for parameter `{parameter}` of {owner}")]
    MissingArgument { owner: String, parameter: String },

    #[error("unexpected argument `{0}`")]
    UnexpectedArgument(String),

    #[error("unknown action `{0}`")]
    UnknownAction(String),

    #[error("action `{0}` is registered twice")]
    DuplicateAction(String),

    #[error("run `{0}` has no action bound")]
    NoAction(String),

    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Failure of a single item. Subject to the run's exception policy.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("action `{action}` failed: {source}")]
    Action {
        action: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("interceptor failed: {0}")]
    Interceptor(#[source] BoxError),

    #[error("item processing was cancelled")]
    Cancelled,
}

impl ItemError {
    pub fn interceptor(error: impl Into<BoxError>) -> Self {
        Self::Interceptor(error.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Error)]
#[error("resolver for `{parameter}` failed: {source}")]
pub struct ResolutionError {
    pub parameter: String,
    #[source]
    pub source: BoxError,
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no run is active in the current task")]
    NotInRun,
}

#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("argument `{0}` is not bound")]
    Missing(String),

    #[error("argument `{name}` has an unexpected shape: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}
