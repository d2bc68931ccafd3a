//! # Reel Testing
//!
//! Testing utilities for handlers written against the Reel effect algebra.
//!
//! This crate provides:
//! - [`TestInterpreter`]: a synchronous interpreter whose results are plain
//!   data ([`TestResponse`]) that assertions can inspect
//! - [`TestEnvironment`]: session, context and an ordered list of expected
//!   queries with canned results
//! - [`ExpectedCalls`]: ordered expectations for collaborator fakes
//! - [`Flow`]: multi-step journeys (follow a link, submit a form, follow the
//!   redirect) entirely in memory
//! - Mock implementations of environment traits ([`FixedClock`])
//!
//! ## Example
//!
//! ```ignore
//! use reel_testing::{QueryExpectation, TestEnvironment, TestInterpreter};
//!
//! #[test]
//! fn test_register() {
//!     let env = TestEnvironment::new(context()).with_session(session());
//!     env.expect(QueryExpectation::returning(&update_user(&form), 1));
//!
//!     let handler: Reader<_, TestInterpreter> = register();
//!     let response = handler.run(env.clone()).post_form([("csrf", token)]);
//!
//!     response.assert_redirect("/subscription/new");
//!     env.assert_exhausted();
//! }
//! ```

pub mod environment;
pub mod expectations;
pub mod flow;
pub mod interpreter;

pub use environment::{QueryExpectation, TestEnvironment};
pub use expectations::ExpectedCalls;
pub use flow::{Flow, FlowRequest};
pub use interpreter::{TestInterpreter, TestResponse};

use chrono::{DateTime, Utc};
use reel_core::environment::Clock;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use reel_testing::mocks::FixedClock;
    /// use reel_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2026-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; output is captured by the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
