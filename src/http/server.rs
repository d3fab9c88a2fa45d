//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the entry Axum Router that every request passes through
//! - Wire up middleware (tracing, timeout, request ID)
//! - Dispatch each request to the live route table
//! - Serve until told to drain

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::observability::metrics;
use crate::routing::{RebuildTrigger, RouteTableManager};
use crate::sessions::SessionStore;
use crate::storage::Store;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: Arc<SessionStore>,
    /// Set once the state is owned by a table manager.
    pub tables: Weak<RouteTableManager>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, sessions: Arc<SessionStore>) -> Self {
        Self {
            store,
            sessions,
            tables: Weak::new(),
        }
    }

    pub fn with_tables(self, tables: Weak<RouteTableManager>) -> Self {
        Self { tables, ..self }
    }

    /// Rebuild the route table after a content change.
    pub async fn rebuild_routes(&self, trigger: RebuildTrigger) {
        match self.tables.upgrade() {
            Some(tables) => {
                tables.rebuild(trigger).await;
            }
            None => tracing::debug!("No route table manager attached, skipping rebuild"),
        }
    }
}

/// HTTP server for the content site.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(tables: Arc<RouteTableManager>, config: &ServerConfig) -> Self {
        Self {
            router: Self::build_router(tables, config),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(tables: Arc<RouteTableManager>, config: &ServerConfig) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(tables)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` resolves, then drain in-flight
    /// requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Entry handler: route the request through whichever table is live now.
async fn dispatch(State(tables): State<Arc<RouteTableManager>>, request: Request) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();

    // Only the router handle is kept; the table itself may be replaced and
    // dropped while this request is still running.
    let router = tables.current().router();
    let response = match router.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    metrics::record_request(&method, response.status().as_u16(), start_time);
    response
}
