//! Dispatch table construction.
//!
//! # Responsibilities
//! - Register the fixed administrative routes
//! - Mount each visible subdirectory of the static root as a path prefix
//! - Register every stored page route as a GET route
//! - Wrap every route in the access guard
//!
//! # Design Decisions
//! - A build never fails: unreadable directories or storage errors are
//!   logged and the affected routes are left out
//! - Earlier registrations win on collision (admin, then static, then
//!   pages) so the router is never handed a conflicting pattern
//! - Output is sorted, so equal inputs produce equal tables

use std::collections::BTreeSet;
use std::path::PathBuf;

use axum::middleware;
use axum::Router;
use tower_http::services::ServeDir;

use crate::admin::AdminRoute;
use crate::http::response::not_found;
use crate::http::server::AppState;
use crate::routing::handler::RouteHandler;
use crate::routing::matcher::{is_admin_path, is_mappable_route, is_servable_dir_name};
use crate::routing::router::{DispatchTable, RouteEntry};
use crate::security::access_control::{access_control_middleware, classify, Protection};

#[derive(Clone)]
pub struct TableBuilder {
    state: AppState,
    static_dir: PathBuf,
}

impl TableBuilder {
    pub fn new(state: AppState, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            state,
            static_dir: static_dir.into(),
        }
    }

    /// Snapshot storage and the static root into a new table.
    pub fn build(&self, generation: u64) -> DispatchTable {
        let mut entries = admin_entries();
        let statics = self.static_entries(&entries);
        entries.extend(statics);
        let pages = self.page_entries(&entries);
        entries.extend(pages);

        let router = self.compile(&entries);
        tracing::debug!(generation, routes = entries.len(), "Route table built");
        DispatchTable::new(generation, entries, router)
    }

    fn static_entries(&self, taken: &[RouteEntry]) -> Vec<RouteEntry> {
        let dir = match std::fs::read_dir(&self.static_dir) {
            Ok(dir) => dir,
            Err(e) => {
                tracing::warn!(
                    dir = %self.static_dir.display(),
                    error = %e,
                    "Static directory unreadable, serving no static routes"
                );
                return Vec::new();
            }
        };

        let mut names: Vec<String> = dir
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();

        names
            .into_iter()
            .filter_map(|name| {
                if !is_servable_dir_name(&name) {
                    tracing::debug!(name = %name, "Skipping static directory with unservable name");
                    return None;
                }
                let pattern = format!("/{}", name);
                if is_admin_path(&pattern) || taken.iter().any(|e| e.pattern == pattern) {
                    tracing::warn!(pattern = %pattern, "Static directory collides with a reserved route, skipping");
                    return None;
                }
                let handler = RouteHandler::StaticDir {
                    dir: self.static_dir.join(&name),
                };
                Some(RouteEntry::new(pattern, handler, false))
            })
            .collect()
    }

    fn page_entries(&self, taken: &[RouteEntry]) -> Vec<RouteEntry> {
        let store = self.state.store.as_ref();
        let routes = match store.page_routes() {
            Ok(routes) => routes,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load page routes, serving without them");
                return Vec::new();
            }
        };

        let distinct: BTreeSet<String> = routes.into_iter().collect();
        distinct
            .into_iter()
            .filter_map(|route| {
                if !is_mappable_route(&route) {
                    tracing::warn!(route = %route, "Stored page route is not a literal path, skipping");
                    return None;
                }
                if is_admin_path(&route) || taken.iter().any(|e| e.covers(&route)) {
                    tracing::warn!(route = %route, "Stored page route collides with a reserved route, skipping");
                    return None;
                }
                let protected = classify(store, &route) == Protection::Protected;
                Some(RouteEntry::new(route, RouteHandler::SavedPage, protected))
            })
            .collect()
    }

    fn compile(&self, entries: &[RouteEntry]) -> Router {
        let mut router: Router<AppState> = Router::new();
        for entry in entries {
            router = match &entry.handler {
                RouteHandler::StaticDir { dir } => router.nest_service(&entry.pattern, ServeDir::new(dir)),
                handler => match handler.method_router() {
                    Some(method_router) => router.route(&entry.pattern, method_router),
                    None => router,
                },
            };
        }

        // route_layer: unmatched paths fall through to 404 without the guard.
        router
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                access_control_middleware,
            ))
            .fallback(not_found)
            .with_state(self.state.clone())
    }
}

fn admin_entries() -> Vec<RouteEntry> {
    AdminRoute::ALL
        .iter()
        .map(|route| RouteEntry::new(route.pattern(), RouteHandler::Admin(*route), is_admin_path(route.pattern())))
        .collect()
}
