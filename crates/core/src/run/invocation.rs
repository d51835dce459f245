use indexmap::IndexMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Call-time inputs of one run: keyword overrides, the action to use and an
/// optional external cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    pub arguments: IndexMap<String, Value>,
    pub action: Option<String>,
    pub cancel: Option<CancellationToken>,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Selects a named action instead of the run's default.
    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.action = Some(name.into());
        self
    }

    /// Cancelling `token` cancels the run. Items already in flight settle as
    /// cancelled and no further items are pulled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
