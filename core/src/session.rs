//! Session capability.

use crate::error::HandlerError;
use crate::interpreter::Respond;
use crate::promise::Promise;
use crate::reader::Reader;

/// Environments that can resolve the request's session.
///
/// Implementations memoize: asking twice within one request yields the same
/// session without a second lookup.
pub trait ProvidesSession {
    /// The session type.
    type Session: Clone + Send + Sync + 'static;

    /// The session, or `None` for anonymous requests.
    fn session(&self) -> Promise<Option<Self::Session>>;
}

/// Interpreters that can hand the current session to a handler.
pub trait HasSession: Respond {
    /// The session type.
    type Session: Clone + Send + Sync + 'static;

    /// Continue with the session, if any.
    fn with_session<F>(then: F) -> Self
    where
        F: FnOnce(Option<Self::Session>) -> Self + Send + 'static;

    /// Continue only when a session exists; otherwise answer with
    /// [`HandlerError::unauthorized`].
    fn require_session<F>(then: F) -> Self
    where
        F: FnOnce(Self::Session) -> Self + Send + 'static,
    {
        Self::with_session(|session| match session {
            Some(session) => then(session),
            None => Self::write_error(HandlerError::unauthorized()),
        })
    }
}

impl<E, I> HasSession for Reader<E, I>
where
    E: ProvidesSession + Send + 'static,
    I: Respond,
{
    type Session = E::Session;

    fn with_session<F>(then: F) -> Self
    where
        F: FnOnce(Option<Self::Session>) -> Self + Send + 'static,
    {
        Self::new(move |env: E| {
            let session = env.session();
            I::on_complete(session, move |session| then(session).run(env))
        })
    }
}
