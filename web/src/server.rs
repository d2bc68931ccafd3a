//! Per-request dispatch.
//!
//! Every request goes through one fallback handler:
//!
//! 1. [`RequestInfo`] is taken from the request head
//! 2. a [`LazyConnection`] is scoped to the request and closed afterwards
//! 3. the [`Site`] builds the request's [`Live`] effect tree
//! 4. [`reel_runtime::run`] drives it, reading the body only when asked
//! 5. the [`Reply`](reel_runtime::Reply) becomes an HTTP response

use crate::cookies;
use crate::error::ServeError;
use crate::middleware::request_id_layer;
use crate::reply;
use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, Method};
use reel_core::Connector;
use reel_runtime::metrics::RuntimeMetrics;
use reel_runtime::{BodySource, LazyConnection, Live, RuntimeError, scoped};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Largest request body read into memory.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// What a site sees of a request before its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// Request method.
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    /// Raw query string, if any.
    pub query: Option<String>,
    /// Value of the `sessionid` cookie.
    pub session_id: Option<String>,
}

impl RequestInfo {
    /// Extract the parts a site needs.
    #[must_use]
    pub fn new(method: Method, uri: &http::Uri, headers: &HeaderMap) -> Self {
        Self {
            method,
            path: uri.path().to_owned(),
            query: uri.query().map(str::to_owned),
            session_id: cookies::session_id(headers),
        }
    }
}

/// A site served through the live interpreter.
pub trait Site: Send + Sync + 'static {
    /// Opens the per-request database connection.
    type Connector: Connector;

    /// Shared connector.
    fn connector(&self) -> &Self::Connector;

    /// Directory that file replies are served from.
    fn resource_root(&self) -> &Path;

    /// Largest body accepted for a request.
    fn body_limit(&self) -> usize {
        DEFAULT_BODY_LIMIT
    }

    /// Build the effect tree for one request.
    ///
    /// Nothing runs here; the returned value is driven afterwards.
    fn handle(&self, request: &RequestInfo, connection: LazyConnection<Self::Connector>) -> Live;
}

/// The axum router for `site`: every path goes to [`dispatch`].
pub fn router<S: Site>(site: Arc<S>) -> Router {
    Router::new()
        .fallback(dispatch::<S>)
        .with_state(site)
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
}

/// Serve `site` on `address` until `shutdown` resolves.
///
/// # Errors
///
/// [`ServeError::Bind`] if the address cannot be bound, [`ServeError::Io`]
/// if the server stops with an error.
pub async fn serve<S, F>(site: Arc<S>, address: &str, shutdown: F) -> Result<(), ServeError>
where
    S: Site,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| ServeError::Bind {
            address: address.to_owned(),
            source,
        })?;
    tracing::info!(address, "Listening");
    axum::serve(listener, router(site))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Handle one request.
pub async fn dispatch<S: Site>(State(site): State<Arc<S>>, request: Request) -> Response {
    let started = Instant::now();
    let (parts, body) = request.into_parts();
    let info = RequestInfo::new(parts.method.clone(), &parts.uri, &parts.headers);
    let body = RequestBody {
        declared_length: declared_length(&parts.headers),
        body,
        limit: site.body_limit(),
    };

    let result = scoped(site.connector().clone(), |connection| {
        let live = site.handle(&info, connection);
        reel_runtime::run(live, body)
    })
    .await;

    let (outcome, response) = match result {
        Ok(reply) => {
            let outcome = reply.outcome();
            (
                outcome,
                reply::into_response(reply, site.resource_root(), parts.headers).await,
            )
        },
        Err(error) => ("rejected", ServeError::from(error).into_response()),
    };

    tracing::debug!(
        outcome,
        status = response.status().as_u16(),
        elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Request handled"
    );
    RuntimeMetrics::record_request(outcome, started.elapsed());
    response
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// The request body, read at most once and only when the effect tree asks.
struct RequestBody {
    declared_length: Option<usize>,
    body: Body,
    limit: usize,
}

impl BodySource for RequestBody {
    async fn read_to_end(self) -> Result<Bytes, RuntimeError> {
        if self.declared_length.is_some_and(|length| length > self.limit) {
            return Err(RuntimeError::BodyTooLarge { limit: self.limit });
        }
        axum::body::to_bytes(self.body, self.limit)
            .await
            .map_err(|e| RuntimeError::BodyRead(e.to_string()))
    }
}
