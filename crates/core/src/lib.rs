pub mod action;
pub mod arguments;
pub mod context;
pub mod error;
pub mod executor;
pub mod interceptor;
pub mod mode;
pub mod producer;
pub mod run;
pub mod types;

pub use action::Action;
pub use arguments::{Arguments, Parameter, Resolver, Resolvers};
pub use context::{Context, ITEM_KEY, RUN_KEY, ScopeKind, current, override_result};
pub use error::*;
pub use executor::{Outcome, RunPhase, RunResult};
pub use interceptor::{
    Activation, Chain, Interceptor, Next, NoOpInterceptor, activate, with_interceptors,
};
pub use mode::{Dispatch, Mode};
pub use producer::{Produced, Source};
pub use run::{Invocation, Run, RunBuilder};
pub use types::*;

pub use tokio_util::sync::CancellationToken;
