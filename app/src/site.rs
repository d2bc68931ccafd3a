//! The live site: route, build the handler and run it in a request
//! environment.

use crate::context::Context;
use crate::handlers;
use crate::model::{Session, session};
use crate::route::Route;
use reel_core::{Connector, Promise, Reader};
use reel_runtime::{LazyConnection, Live, RequestEnvironment};
use reel_web::{RequestInfo, Site};
use std::path::Path;
use std::sync::Arc;

/// The environment handlers run in on the server.
pub type LiveEnvironment<K> = RequestEnvironment<Session, Context, K>;

/// Serves every route of the app.
#[derive(Debug)]
pub struct ReelSite<K: Connector> {
    connector: K,
    context: Arc<Context>,
}

impl<K: Connector> ReelSite<K> {
    #[must_use]
    pub const fn new(connector: K, context: Arc<Context>) -> Self {
        Self { connector, context }
    }

    /// The environment for one request. The session is loaded on the
    /// request's own connection, and only if a handler asks for it.
    fn environment(&self, request: &RequestInfo, connection: LazyConnection<K>) -> LiveEnvironment<K> {
        let session = match request.session_id.clone() {
            Some(id) => {
                let lookup = connection.clone();
                let now = self.context.now();
                Promise::from_future(async move { session::load(&lookup, &id, now).await })
            },
            None => Promise::ready(None),
        };
        RequestEnvironment::new(connection, Arc::clone(&self.context), session)
    }
}

impl<K: Connector> Site for ReelSite<K> {
    type Connector = K;

    fn connector(&self) -> &K {
        &self.connector
    }

    fn resource_root(&self) -> &Path {
        &self.context.config.resource_path
    }

    fn handle(&self, request: &RequestInfo, connection: LazyConnection<K>) -> Live {
        let route = Route::parse(&request.method, &request.path, request.query.as_deref());
        tracing::debug!(?route, "Routed request");
        let handler: Reader<LiveEnvironment<K>, Live> = handlers::handle(route);
        handler.run(self.environment(request, connection))
    }
}
