//! Process-wide context capability.
//!
//! Configuration, the clock and collaborator clients live in one context value
//! built at startup and shared by every request environment.

use crate::interpreter::Respond;
use crate::reader::Reader;
use std::sync::Arc;

/// Environments carrying the process-wide context.
pub trait ProvidesContext {
    /// The context type.
    type Context: Send + Sync + 'static;

    /// Shared handle to the context.
    fn context(&self) -> Arc<Self::Context>;
}

/// Interpreters that can hand the context to a handler.
pub trait HasContext: Respond {
    /// The context type.
    type Context: Send + Sync + 'static;

    /// Continue with the context.
    fn with_context<F>(then: F) -> Self
    where
        F: FnOnce(Arc<Self::Context>) -> Self + Send + 'static;
}

impl<E, I> HasContext for Reader<E, I>
where
    E: ProvidesContext + Send + 'static,
    I: Respond,
{
    type Context = E::Context;

    fn with_context<F>(then: F) -> Self
    where
        F: FnOnce(Arc<Self::Context>) -> Self + Send + 'static,
    {
        Self::ask(|env: &E| env.context(), then)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Env, Recorded};
    use http::StatusCode;

    #[test]
    fn test_with_context() {
        let env = Env {
            context: Arc::new("https://example.test".to_owned()),
            ..Env::default()
        };
        let handler = Reader::<Env, Recorded>::with_context(|base_url| {
            Reader::write_text(base_url.as_str(), StatusCode::OK)
        });
        assert_eq!(handler.run(env).body(), "https://example.test");
    }
}
