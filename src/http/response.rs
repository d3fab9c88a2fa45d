//! Response helpers shared by every handler.
//!
//! # Responsibilities
//! - Generic bodies for 403, 404 and 500
//! - Map handler errors to a logged 500 without leaking detail
//! - Attach `Set-Cookie` headers to an outgoing response
//!
//! # Design Decisions
//! - Error responses never echo storage or cookie errors to the client

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::sessions::cookie::{append_set_cookies, SessionError};
use crate::storage::StoreError;

pub const ACCESS_DENIED: &str = "Access denied";
pub const NOT_FOUND: &str = "404 page not found";
pub const INTERNAL_ERROR: &str = "500 Internal Server Error";

pub fn access_denied() -> Response {
    (StatusCode::FORBIDDEN, ACCESS_DENIED).into_response()
}

/// Fallback for paths no route matches.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, NOT_FOUND).into_response()
}

pub fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR).into_response()
}

/// Add `Set-Cookie` headers to a response.
pub fn with_cookies(mut response: Response, cookies: Vec<HeaderValue>) -> Response {
    append_set_cookies(response.headers_mut(), cookies);
    response
}

/// Errors a handler can bubble up with `?`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");
        internal_error()
    }
}
