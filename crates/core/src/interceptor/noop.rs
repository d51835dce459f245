use super::traits::Interceptor;

/// Passes every item straight through.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpInterceptor;

impl Interceptor for NoOpInterceptor {}
