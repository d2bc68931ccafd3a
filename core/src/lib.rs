//! # Reel Core
//!
//! The request-handling algebra of the Reel subscription-video server.
//!
//! Route handlers never perform I/O. They build a *description* of a response
//! (write a body, redirect, stream a file, wait for a promise, read the POST
//! body) against an abstract interpreter, and a concrete interpreter decides
//! how that description executes: the live tokio interpreter in
//! `reel-runtime`, or the synchronous in-memory one in `reel-testing`.
//!
//! ## Core Concepts
//!
//! - **Interpreter**: [`Respond`] is the base effect algebra, [`ReadBody`] adds
//!   the single forward-only read of the request body.
//! - **Reader**: [`Reader`] defers every operation until a per-request
//!   environment is supplied.
//! - **Capabilities**: narrow traits layered on top ([`HasSession`],
//!   [`HasDatabase`], [`HasContext`], [`VerifiedPost`], [`Forms`]) so handlers
//!   depend only on what they use.
//! - **Queries**: [`Query`] pairs a statement, bound parameters and a parse
//!   function. Pure data; the environment decides how to run it.
//!
//! ## Example
//!
//! ```ignore
//! use reel_core::{HasSession, Respond};
//!
//! fn account<I: HasSession<Session = Session>>() -> I {
//!     I::require_session(|session| {
//!         I::write_html(views::account(&session), StatusCode::OK)
//!     })
//! }
//! ```

pub mod context;
pub mod csrf;
pub mod database;
pub mod error;
pub mod form;
pub mod html;
pub mod interpreter;
pub mod promise;
pub mod query;
pub mod reader;
pub mod session;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use bytes::Bytes;
pub use chrono::{DateTime, Utc};
pub use http::{HeaderMap, StatusCode};

pub use context::{HasContext, ProvidesContext};
pub use csrf::{CsrfSession, CsrfToken, FormData, VerifiedPost};
pub use database::{HasDatabase, ProvidesDatabase};
pub use error::HandlerError;
pub use form::{FieldError, FormDefinition, Forms};
pub use interpreter::{ReadBody, Respond};
pub use promise::{Completion, Promise};
pub use query::{Connection, Connector, FromValue, Query, QueryError, QueryResult, Row, Value};
pub use reader::Reader;
pub use session::{HasSession, ProvidesSession};

/// Environment module - process-wide dependencies injected at startup
///
/// Everything here is handed to interpreters explicitly through a context
/// value; nothing is read from ambient global state.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use environment::{Clock, SystemClock};
