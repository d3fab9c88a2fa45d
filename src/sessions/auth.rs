//! Password checks and server-side auth sessions.

use axum::http::HeaderMap;

use crate::sessions::cookie::{SessionStore, AUTH, SESSION_UUID_KEY};
use crate::storage::{unix_now, AuthSession, Store, StoreError, User};

/// Hex digest stored in `User::auth_hash`.
pub fn hash_password(password: &str) -> String {
    blake3::hash(password.as_bytes()).to_hex().to_string()
}

pub fn verify_password(user: &User, password: &str) -> bool {
    blake3::Hash::from_hex(&user.auth_hash)
        .map(|stored| stored == blake3::hash(password.as_bytes()))
        .unwrap_or(false)
}

/// The authenticated caller, attached to request extensions by the guard.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_id: String,
}

/// Outcome of resolving the `auth` cookie against storage.
#[derive(Debug)]
pub enum SessionLookup {
    /// No usable token was presented.
    Anonymous,
    /// A token was presented but names no live session; the cookie should be
    /// cleared.
    Stale,
    Authenticated(CurrentUser),
}

/// Resolve the caller's `auth` cookie to a user.
///
/// A session whose user has been deleted is removed on sight. Storage
/// failures resolve to `Anonymous` so callers deny rather than guess.
pub fn resolve_session(store: &dyn Store, cookies: &SessionStore, headers: &HeaderMap) -> SessionLookup {
    let auth = match cookies.load(headers, AUTH) {
        Ok(auth) => auth,
        Err(e) => {
            tracing::debug!(error = %e, "Rejecting unverifiable auth cookie");
            return SessionLookup::Stale;
        }
    };
    let token = match auth.get(SESSION_UUID_KEY) {
        Some(token) if !token.is_empty() => token,
        _ => return SessionLookup::Anonymous,
    };

    let session = match store.session_by_id(token) {
        Ok(Some(session)) => session,
        Ok(None) => return SessionLookup::Stale,
        Err(e) => {
            tracing::error!(error = %e, "Session lookup failed");
            return SessionLookup::Anonymous;
        }
    };

    match store.user_by_uuid(&session.user_uuid) {
        Ok(Some(user)) => SessionLookup::Authenticated(CurrentUser {
            user,
            session_id: session.session_id,
        }),
        Ok(None) => {
            tracing::warn!(user = %session.user_uuid, "Removing session of deleted user");
            if let Err(e) = store.delete_session(&session.session_id) {
                tracing::warn!(error = %e, "Failed to remove orphaned session");
            }
            SessionLookup::Stale
        }
        Err(e) => {
            tracing::error!(error = %e, "User lookup failed");
            SessionLookup::Anonymous
        }
    }
}

/// Record activity on a session. Failures are logged and ignored.
pub fn touch(store: &dyn Store, session_id: &str) {
    if let Err(e) = store.touch_session(session_id, unix_now()) {
        tracing::warn!(error = %e, "Failed to update session activity");
    }
}

/// Issue a fresh session token for `user`, replacing any previous one.
pub fn start_session(store: &dyn Store, user: &User) -> Result<AuthSession, StoreError> {
    let now = unix_now();
    let session = AuthSession {
        session_id: uuid::Uuid::new_v4().to_string(),
        user_uuid: user.uuid.clone(),
        created_at: now,
        last_active_at: now,
    };

    if store.session_by_user(&user.uuid)?.is_some() {
        store.replace_user_session(session.clone())?;
    } else {
        match store.insert_session(session.clone()) {
            Ok(()) => {}
            // Lost a race with a concurrent login for the same user.
            Err(StoreError::Conflict { .. }) => store.replace_user_session(session.clone())?,
            Err(e) => return Err(e),
        }
    }
    tracing::info!(user = %user.username, "Session started");
    Ok(session)
}

/// Delete the session named by the caller's cookie, if any.
pub fn end_session(store: &dyn Store, cookies: &SessionStore, headers: &HeaderMap) -> Result<(), StoreError> {
    let auth = cookies.get(headers, AUTH);
    if let Some(token) = auth.get(SESSION_UUID_KEY) {
        store.delete_session(token)?;
    }
    Ok(())
}
