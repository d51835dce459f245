use async_trait::async_trait;
use serde_json::Value;

use crate::{error::ItemError, types::Item};

use super::Next;

/// Middleware around the processing of one item.
///
/// `process_item` receives the item and the continuation (the rest of the
/// chain, ending in the action call). An implementation may run code before
/// and after `next.run(item)`, call it several times, skip it entirely, or
/// rewrite whatever it returns.
#[allow(unused_variables)]
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn process_item(&self, item: &Item, next: Next<'_>) -> Result<Value, ItemError> {
        next.run(item).await
    }

    /// Called when an activation scope containing this interceptor opens.
    fn activated(&self) {}

    /// Called when that scope closes, on every exit path.
    fn deactivated(&self) {}
}
