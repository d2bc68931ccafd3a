//! Ordered expectations for collaborator fakes.

// An unexpected call is a test failure.
#![allow(clippy::panic)]

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Calls a fake collaborator expects, each paired with its canned response.
///
/// Calls must arrive in the order they were registered and with equal
/// arguments. Clones share the same list, so a test can keep one handle while
/// the fake holds another.
pub struct ExpectedCalls<Req, Resp> {
    name: &'static str,
    state: Arc<Mutex<CallState<Req, Resp>>>,
}

struct CallState<Req, Resp> {
    expected: VecDeque<(Req, Resp)>,
    received: Vec<Req>,
}

impl<Req, Resp> ExpectedCalls<Req, Resp>
where
    Req: fmt::Debug + PartialEq + Clone,
{
    /// An empty list named after the collaborator.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(CallState {
                expected: VecDeque::new(),
                received: Vec::new(),
            })),
        }
    }

    /// Expect `request` next and answer it with `response`.
    pub fn expect(&self, request: Req, response: Resp) {
        self.lock().expected.push_back((request, response));
    }

    /// Consume the next expectation.
    ///
    /// # Panics
    ///
    /// If no call is expected or `request` differs from the next expected one.
    pub fn call(&self, request: Req) -> Resp {
        let mut state = self.lock();
        state.received.push(request.clone());
        let Some((expected, response)) = state.expected.pop_front() else {
            panic!("{}: unexpected call {request:?}", self.name);
        };
        assert_eq!(request, expected, "{}: call does not match expectation", self.name);
        response
    }

    /// Every call received so far.
    #[must_use]
    pub fn received(&self) -> Vec<Req> {
        self.lock().received.clone()
    }

    /// Panic if any expected call never arrived.
    pub fn assert_exhausted(&self) {
        let state = self.lock();
        assert!(
            state.expected.is_empty(),
            "{}: expected calls never made: {:?}",
            self.name,
            state.expected.iter().map(|(req, _)| req).collect::<Vec<_>>()
        );
    }

    fn lock(&self) -> MutexGuard<'_, CallState<Req, Resp>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<Req, Resp> Clone for ExpectedCalls<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            state: Arc::clone(&self.state),
        }
    }
}

impl<Req, Resp> fmt::Debug for ExpectedCalls<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectedCalls")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calls_answered_in_order() {
        let mailer = ExpectedCalls::new("mailer");
        mailer.expect("welcome".to_owned(), true);
        mailer.expect("receipt".to_owned(), false);

        assert!(mailer.call("welcome".to_owned()));
        assert!(!mailer.clone().call("receipt".to_owned()));
        assert_eq!(mailer.received(), vec!["welcome", "receipt"]);
        mailer.assert_exhausted();
    }

    #[test]
    #[should_panic(expected = "mailer: unexpected call")]
    fn test_unexpected_call_panics() {
        let mailer: ExpectedCalls<&str, ()> = ExpectedCalls::new("mailer");
        mailer.call("spam");
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_mismatched_call_panics() {
        let billing = ExpectedCalls::new("billing");
        billing.expect(1, ());
        billing.call(2);
    }
}
