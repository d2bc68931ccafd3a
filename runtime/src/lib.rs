//! # Reel Runtime
//!
//! The live side of the Reel request pipeline.
//!
//! Handlers are built against the effect algebra in `reel-core`. This crate
//! provides the interpreter that actually executes them on tokio, plus the
//! per-request and process-wide resources a live environment needs.
//!
//! ## Core Components
//!
//! - **Live interpreter**: [`Live`] and [`LiveResponse`] implement the algebra;
//!   [`run`] drives one request to a [`Reply`] without blocking a worker.
//! - **Lazy resources**: [`Lazy`] memoizes a value computed on first use,
//!   [`LazyConnection`] opens a database connection on first query and
//!   [`scoped`] guarantees it is closed exactly once.
//! - **Request environment**: [`RequestEnvironment`] provides session,
//!   database and context to `Reader`-wrapped handlers.
//! - **Snapshots**: [`Snapshot`] publishes process-wide data atomically.
//! - **Poller**: [`TaskPoller`] runs due background tasks on an interval.
//!
//! ## Example
//!
//! ```ignore
//! use reel_runtime::{Live, RequestEnvironment, scoped};
//!
//! let reply = scoped(connector, |connection| async move {
//!     let env = RequestEnvironment::new(connection, context, session);
//!     let live: Live = handler(route).run(env);
//!     reel_runtime::run(live, body).await
//! })
//! .await?;
//! ```

pub mod connection;
pub mod environment;
pub mod lazy;
pub mod live;
pub mod metrics;
pub mod scheduler;
pub mod snapshot;

pub use connection::{LazyConnection, scoped};
pub use environment::RequestEnvironment;
pub use lazy::Lazy;
pub use live::{BodySource, Live, LiveResponse, Reply, run};
pub use scheduler::{PollSummary, TaskPoller, TaskQueue};
pub use snapshot::Snapshot;

/// Error types for the live interpreter
pub mod error {
    use thiserror::Error;

    /// Errors that can occur while driving a request
    ///
    /// Handler-level failures never surface here; they are already turned
    /// into error pages by the algebra. These are transport problems.
    #[derive(Error, Debug)]
    pub enum RuntimeError {
        /// The request body could not be read
        #[error("Failed to read request body: {0}")]
        BodyRead(String),

        /// The request body exceeded the configured limit
        #[error("Request body larger than {limit} bytes")]
        BodyTooLarge {
            /// Configured limit in bytes
            limit: usize,
        },
    }
}

pub use error::RuntimeError;
