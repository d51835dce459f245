pub mod chain;
pub mod noop;
pub mod scope;
pub mod traits;

pub use chain::{Chain, Next, Terminal};
pub(crate) use chain::InterceptorStack;
pub use noop::NoOpInterceptor;
pub use scope::{Activation, activate, with_interceptors};
pub use traits::Interceptor;
