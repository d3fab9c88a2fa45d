//! Login, logout and first-run setup.
//!
//! # Responsibilities
//! - Issue a per-render anti-replay token for the login form
//! - Verify credentials and start the user's single session
//! - Carry a one-shot error message back to the login form
//! - Create the root user while none exists

use axum::{
    extract::{Form, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::admin::handlers::{new_user_from_form, NewUserForm};
use crate::admin::views;
use crate::http::response::{with_cookies, AppError};
use crate::http::server::AppState;
use crate::sessions::auth::{end_session, resolve_session, start_session, verify_password, SessionLookup};
use crate::sessions::cookie::{CookieSession, AUTH, ERROR_MESSAGE_KEY, FORMS, PASS_ERR_MSG, SESSION_UUID_KEY};
use crate::storage::{StoreError, UserRole};

pub const LOGIN_FORM: &str = "loginform";
pub const LOGIN_FAILED: &str = "Username or password incorrect...";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub formname: String,
    #[serde(default)]
    pub formhash: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login_page(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if let SessionLookup::Authenticated(_) = resolve_session(state.store.as_ref(), &state.sessions, &headers) {
        return Ok(Redirect::to("/admin").into_response());
    }

    let token = uuid::Uuid::new_v4().to_string();
    let mut forms = state.sessions.get(&headers, FORMS);
    forms.set(LOGIN_FORM, token.as_str());
    let mut cookies = vec![state.sessions.save(&forms)?];

    let mut errors = state.sessions.get(&headers, PASS_ERR_MSG);
    let message = errors.take(ERROR_MESSAGE_KEY).filter(|m| !m.is_empty());
    if message.is_some() {
        tracing::debug!("Showing login error message");
        cookies.push(state.sessions.save(&errors)?);
    }

    let html = Html(views::login(LOGIN_FORM, &token, message.as_deref()));
    Ok(with_cookies(html.into_response(), cookies))
}

pub async fn login_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let store = state.store.as_ref();

    // The token is single-use whether or not it matches.
    let mut forms = state.sessions.get(&headers, FORMS);
    let expected = forms.take(&form.formname);
    let mut cookies = vec![state.sessions.save(&forms)?];

    if form.formhash.is_empty() || expected.as_deref() != Some(form.formhash.as_str()) {
        tracing::warn!(form = %form.formname, "Login form submitted with a missing or reused token");
        return Ok(with_cookies(Redirect::to("/login").into_response(), cookies));
    }

    let user = store
        .user_by_username(&form.username)?
        .filter(|user| verify_password(user, &form.password));

    match user {
        Some(user) => {
            let session = start_session(store, &user)?;
            let mut auth = CookieSession::new(AUTH);
            auth.set(SESSION_UUID_KEY, session.session_id);
            cookies.push(state.sessions.save(&auth)?);
            Ok(with_cookies(Redirect::to("/admin").into_response(), cookies))
        }
        None => {
            tracing::info!(username = %form.username, "Failed login attempt");
            let mut errors = CookieSession::new(PASS_ERR_MSG);
            errors.set(ERROR_MESSAGE_KEY, LOGIN_FAILED);
            cookies.push(state.sessions.expire(AUTH)?);
            cookies.push(state.sessions.save(&errors)?);
            Ok(with_cookies(Redirect::to("/login").into_response(), cookies))
        }
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    end_session(state.store.as_ref(), &state.sessions, &headers)?;
    let cookies = vec![state.sessions.expire(AUTH)?];
    Ok(with_cookies(Redirect::to("/login").into_response(), cookies))
}

fn root_exists(state: &AppState) -> Result<bool, StoreError> {
    Ok(state.store.users()?.iter().any(|u| u.role == UserRole::Root))
}

pub async fn setup_page(State(state): State<AppState>) -> Result<Response, AppError> {
    if root_exists(&state)? {
        return Ok(Redirect::to("/login").into_response());
    }
    Ok(Html(views::setup(None)).into_response())
}

pub async fn setup_submit(
    State(state): State<AppState>,
    Form(form): Form<NewUserForm>,
) -> Result<Response, AppError> {
    if root_exists(&state)? {
        tracing::warn!("Setup submitted after a root user already exists");
        return Ok(Redirect::to("/login").into_response());
    }

    let user = match new_user_from_form(&form, UserRole::Root) {
        Ok(user) => user,
        Err(message) => return Ok(Html(views::setup(Some(message))).into_response()),
    };
    match state.store.insert_user(user) {
        Ok(()) => {}
        Err(StoreError::Conflict { .. }) => {
            return Ok(Html(views::setup(Some("Username is already taken"))).into_response());
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(username = %form.username, "Root user created");
    Ok(Redirect::to("/login").into_response())
}
