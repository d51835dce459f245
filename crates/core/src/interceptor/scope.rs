use std::{future::Future, sync::Arc};

use crate::{context::Context, error::ContextError};

use super::{Chain, InterceptorStack};

/// Keeps a set of interceptors on the active chain of the scope that opened
/// it. Dropping it removes exactly those interceptors again, whichever way
/// the owning scope is left.
#[must_use = "interceptors are deactivated as soon as the activation is dropped"]
pub struct Activation {
    run: String,
    stack: Arc<InterceptorStack>,
    id: u64,
    chain: Chain,
}

impl Activation {
    pub(crate) fn open(context: &Context, chain: Chain) -> Self {
        let stack = Arc::clone(context.interceptors());
        let id = stack.push(&chain);
        for layer in chain.layers() {
            layer.activated();
        }
        tracing::debug!(
            run = %context.run_name(),
            scope = ?context.kind(),
            pushed = chain.len(),
            "interceptors activated"
        );
        Self {
            run: context.run_name().to_string(),
            stack,
            id,
            chain,
        }
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        self.stack.remove(self.id);
        for layer in self.chain.layers().iter().rev() {
            layer.deactivated();
        }
        tracing::debug!(run = %self.run, popped = self.chain.len(), "interceptors deactivated");
    }
}

impl std::fmt::Debug for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Activation")
            .field("run", &self.run)
            .field("id", &self.id)
            .field("len", &self.chain.len())
            .finish()
    }
}

/// Pushes `chain` onto the interceptors of the current scope until the
/// returned guard is dropped. In the run scope (the entry, or anything it
/// holds open) every item dispatched while the guard lives is wrapped by it.
/// Inside an item the layers stay local to that item's scope.
pub fn activate(chain: Chain) -> Result<Activation, ContextError> {
    let context = Context::current()?;
    Ok(Activation::open(&context, chain))
}

/// Runs `future` with `chain` active.
pub async fn with_interceptors<F>(chain: Chain, future: F) -> Result<F::Output, ContextError>
where
    F: Future,
{
    let _activation = activate(chain)?;
    Ok(future.await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::RunState,
        interceptor::{Interceptor, NoOpInterceptor},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Lifecycle {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    impl Interceptor for Lifecycle {
        fn activated(&self) {
            self.opened.fetch_add(1, Ordering::SeqCst);
        }

        fn deactivated(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn run_context() -> Context {
        Context::root(Arc::new(RunState::new("scope-test", CancellationToken::new())))
    }

    #[test]
    fn activate_requires_a_run() {
        assert!(activate(Chain::new()).is_err());
    }

    #[tokio::test]
    async fn guard_pops_on_drop_and_fires_hooks() {
        let ctx = run_context();
        let lifecycle = Arc::new(Lifecycle::default());
        let layer: Arc<dyn Interceptor> = lifecycle.clone();

        let depth_inside = ctx
            .clone()
            .scope(async {
                let _outer = activate(Chain::new().with(NoOpInterceptor)).expect("inside run");
                let inner = activate(Chain::new().with_shared(layer)).expect("inside run");
                let depth = ctx.interceptors().depth();
                drop(inner);
                depth
            })
            .await;

        assert_eq!(depth_inside, 2);
        assert_eq!(ctx.interceptors().depth(), 0);
        assert_eq!(lifecycle.opened.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scope_is_released_when_the_block_fails() {
        let ctx = run_context();

        let outcome: Result<Result<(), &str>, ContextError> = ctx
            .clone()
            .scope(with_interceptors(Chain::new().with(NoOpInterceptor), async {
                Err("inner failure")
            }))
            .await;

        assert!(matches!(outcome, Ok(Err("inner failure"))));
        assert_eq!(ctx.interceptors().depth(), 0);
    }

    #[tokio::test]
    async fn outer_scope_may_close_before_inner() {
        let ctx = run_context();

        let remaining = ctx
            .clone()
            .scope(async {
                let outer = activate(Chain::new().with(NoOpInterceptor)).expect("inside run");
                let _inner = activate(Chain::new().with(NoOpInterceptor)).expect("inside run");
                drop(outer);
                current_depth()
            })
            .await;

        assert_eq!(remaining, 1);
        assert_eq!(ctx.interceptors().depth(), 0);
    }

    #[tokio::test]
    async fn item_activation_stays_in_the_item_scope() {
        let ctx = run_context();
        let item = ctx.child();

        let inside = item
            .scope(async {
                let _local = activate(Chain::new().with(NoOpInterceptor)).expect("inside item");
                current_depth()
            })
            .await;

        assert_eq!(inside, 1);
        assert_eq!(ctx.interceptors().depth(), 0);
        assert_eq!(ctx.child().interceptors().depth(), 0);
    }

    fn current_depth() -> usize {
        Context::current().expect("inside run").interceptors().depth()
    }
}
