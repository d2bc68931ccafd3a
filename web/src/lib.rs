//! Axum integration for Reel.
//!
//! This crate is the imperative shell around the live interpreter. Handlers
//! never see axum types: a [`Site`] turns a [`RequestInfo`] into an effect
//! tree, and this crate does the rest.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Imperative Shell (axum)         │  ← HTTP, cookies, static files
//! │  - Request id + tracing span            │  ← Metrics
//! │  - Scoped connection, body on demand    │
//! ├─────────────────────────────────────────┤
//! │         Handlers (effect trees)         │
//! │  - Generic over the interpreter         │  ← Run live or under test
//! │  - Sessions, queries, forms, promises   │  ← Descriptions, not actions
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use reel_web::{RequestInfo, Site, serve};
//!
//! impl Site for MySite {
//!     type Connector = PgConnector;
//!
//!     fn connector(&self) -> &PgConnector { &self.connector }
//!     fn resource_root(&self) -> &Path { &self.resources }
//!     fn handle(&self, request: &RequestInfo, connection: LazyConnection<PgConnector>) -> Live {
//!         route(request).handler().run(self.environment(request, connection))
//!     }
//! }
//!
//! serve(Arc::new(site), "0.0.0.0:8080", shutdown_signal()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cookies;
pub mod error;
pub mod middleware;
pub mod reply;
pub mod server;

// Re-export key types for convenience
pub use error::ServeError;
pub use middleware::{REQUEST_ID_HEADER, RequestId, request_id_layer};
pub use server::{RequestInfo, Site, dispatch, router, serve};
