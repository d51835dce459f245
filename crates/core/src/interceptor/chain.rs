use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::{context::lock, error::ItemError, types::Item};

use super::traits::Interceptor;

/// The innermost call of a chain: resolves arguments and runs the action.
pub type Terminal = dyn Fn(Item) -> BoxFuture<'static, Result<Value, ItemError>> + Send + Sync;

/// Ordered list of interceptors. The first one is the outermost.
#[derive(Clone, Default)]
pub struct Chain {
    layers: Vec<Arc<dyn Interceptor>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `interceptor` at the inner end.
    pub fn with<I>(self, interceptor: I) -> Self
    where
        I: Interceptor + 'static,
    {
        self.with_shared(Arc::new(interceptor))
    }

    pub fn with_shared(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.layers.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub(crate) fn layers(&self) -> &[Arc<dyn Interceptor>] {
        &self.layers
    }

    /// Runs `item` through every layer and finally `terminal`.
    pub async fn invoke(&self, item: &Item, terminal: &Terminal) -> Result<Value, ItemError> {
        Next::new(&self.layers, terminal).run(item).await
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("len", &self.layers.len()).finish()
    }
}

/// Continuation handed to an interceptor: the rest of the chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    layers: &'a [Arc<dyn Interceptor>],
    terminal: &'a Terminal,
}

impl<'a> Next<'a> {
    pub(crate) fn new(layers: &'a [Arc<dyn Interceptor>], terminal: &'a Terminal) -> Self {
        Self { layers, terminal }
    }

    /// Number of interceptors still between the caller and the action.
    pub fn remaining(&self) -> usize {
        self.layers.len()
    }

    pub async fn run(self, item: &Item) -> Result<Value, ItemError> {
        match self.layers.split_first() {
            Some((layer, rest)) => layer.process_item(item, Next::new(rest, self.terminal)).await,
            None => (self.terminal)(item.clone()).await,
        }
    }
}

/// Interceptors active in one context scope. Layers are tagged with the id
/// of the activation that pushed them, so activations may close in any order.
#[derive(Default)]
pub(crate) struct InterceptorStack {
    layers: Mutex<Vec<(u64, Arc<dyn Interceptor>)>>,
    next_id: AtomicU64,
}

impl InterceptorStack {
    /// A stack for a new scope, starting from the layers its parent had
    /// active. Inherited layers belong to no activation of this stack.
    pub(crate) fn inherit(chain: &Chain) -> Self {
        let layers = chain.layers().iter().map(|layer| (0, Arc::clone(layer))).collect();
        Self {
            layers: Mutex::new(layers),
            next_id: AtomicU64::new(0),
        }
    }

    /// Appends `chain` at the inner end and returns the id to remove it by.
    pub(crate) fn push(&self, chain: &Chain) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.layers).extend(chain.layers().iter().map(|layer| (id, Arc::clone(layer))));
        id
    }

    pub(crate) fn remove(&self, id: u64) {
        lock(&self.layers).retain(|(owner, _)| *owner != id);
    }

    pub(crate) fn snapshot(&self) -> Chain {
        Chain {
            layers: lock(&self.layers)
                .iter()
                .map(|(_, layer)| Arc::clone(layer))
                .collect(),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        lock(&self.layers).len()
    }
}
