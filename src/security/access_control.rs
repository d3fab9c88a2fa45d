//! Access guard.
//! Requires an authenticated session on admin paths and protected pages.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::request::request_id;
use crate::http::response::{access_denied, with_cookies};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::matcher::is_admin_path;
use crate::sessions::auth::{resolve_session, touch, SessionLookup};
use crate::sessions::cookie::AUTH;
use crate::storage::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    Public,
    Protected,
}

/// Whether `path` needs a session. Fails closed on storage errors.
pub fn classify(store: &dyn Store, path: &str) -> Protection {
    if is_admin_path(path) {
        return Protection::Protected;
    }
    match store.page_by_route(path) {
        Ok(Some(page)) if page.role_protected => Protection::Protected,
        Ok(_) => Protection::Public,
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Page lookup failed, treating path as protected");
            Protection::Protected
        }
    }
}

pub async fn access_control_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let store = state.store.as_ref();

    // 1. Public paths pass straight through.
    if classify(store, req.uri().path()) == Protection::Public {
        return next.run(req).await;
    }

    // 2. Resolve the auth cookie.
    match resolve_session(store, &state.sessions, req.headers()) {
        SessionLookup::Authenticated(current) => {
            touch(store, &current.session_id);
            req.extensions_mut().insert(current);
            next.run(req).await
        }
        SessionLookup::Stale => {
            deny(&req, "stale session");
            match state.sessions.expire(AUTH) {
                Ok(cookie) => with_cookies(access_denied(), vec![cookie]),
                Err(_) => access_denied(),
            }
        }
        SessionLookup::Anonymous => {
            deny(&req, "no session");
            access_denied()
        }
    }
}

fn deny(req: &Request<Body>, reason: &'static str) {
    tracing::info!(
        request_id = %request_id(req),
        path = %req.uri().path(),
        reason,
        "Access denied"
    );
    metrics::record_access_denied();
}
