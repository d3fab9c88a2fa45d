//! Handler variants a route can be bound to.
//!
//! The set is closed: administrative pages, stored pages, and static
//! directories. A dispatch table entry names its variant, and the table
//! builder turns each variant into the axum service that serves it.

use std::path::PathBuf;

use axum::extract::State;
use axum::http::{Method, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, MethodRouter};

use crate::admin::{views, AdminRoute};
use crate::http::response::{not_found, AppError};
use crate::http::server::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteHandler {
    Admin(AdminRoute),
    /// Renders whichever page is stored at the request path.
    SavedPage,
    /// Serves files below `dir`; mounted as a path prefix.
    StaticDir { dir: PathBuf },
}

impl RouteHandler {
    pub fn methods(&self) -> Vec<Method> {
        match self {
            RouteHandler::Admin(route) => route.methods().to_vec(),
            RouteHandler::SavedPage | RouteHandler::StaticDir { .. } => vec![Method::GET, Method::HEAD],
        }
    }

    /// Prefix entries match every path below their pattern.
    pub fn is_prefix(&self) -> bool {
        matches!(self, RouteHandler::StaticDir { .. })
    }

    /// Axum method router for exact-path variants. `None` for prefixes,
    /// which are nested as services instead.
    pub(crate) fn method_router(&self) -> Option<MethodRouter<AppState>> {
        match self {
            RouteHandler::Admin(route) => Some(route.method_router()),
            RouteHandler::SavedPage => Some(get(serve_saved_page)),
            RouteHandler::StaticDir { .. } => None,
        }
    }
}

/// Render the page stored at the request path.
///
/// The page is looked up per request, so edits to content show up without a
/// rebuild; only route additions and removals need one.
pub async fn serve_saved_page(State(state): State<AppState>, uri: Uri) -> Response {
    match state.store.page_by_route(uri.path()) {
        Ok(Some(page)) => Html(views::saved_page(&page)).into_response(),
        Ok(None) => {
            tracing::debug!(path = %uri.path(), "Page removed since the route table was built");
            not_found().await
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
