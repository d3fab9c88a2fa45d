//! Signed, per-namespace session cookies.
//!
//! Each namespace travels in its own cookie named after the namespace. The
//! value is `hex(json payload) "." hex(mac)`, where the MAC is a blake3 keyed
//! hash over the namespace name and the encoded payload. The key is derived
//! from the configured secret, so rotating the secret invalidates every
//! outstanding cookie.

use std::collections::BTreeMap;

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::storage::unix_now;

/// Namespace holding the authenticated session token.
pub const AUTH: &str = "auth";
/// Namespace holding one anti-replay token per form.
pub const FORMS: &str = "forms";
/// Namespace holding a one-shot login error message.
pub const PASS_ERR_MSG: &str = "passerrmsg";

pub const SESSION_UUID_KEY: &str = "sessionuuid";
pub const ERROR_MESSAGE_KEY: &str = "errormessage";

const KEY_CONTEXT: &str = "content-server 2024 session cookie signing key";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("cookie '{0}' is malformed")]
    Malformed(String),

    #[error("cookie '{0}' failed signature verification")]
    Tampered(String),

    #[error("cookie '{0}' has expired")]
    Expired(String),

    #[error("cookie name '{0}' is not a valid header value")]
    InvalidName(String),
}

/// The decoded key-value bag of one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSession {
    namespace: String,
    values: BTreeMap<String, String>,
}

impl CookieSession {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Remove and return a value; used for single-read entries.
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct Payload {
    values: BTreeMap<String, String>,
    issued_at: u64,
}

/// Encodes, signs and verifies namespace cookies.
///
/// Constructed once by the composition root and passed to whoever needs it.
#[derive(Clone)]
pub struct SessionStore {
    key: [u8; 32],
    max_age_secs: u64,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("max_age_secs", &self.max_age_secs)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(secret: &str, max_age_secs: u64) -> Self {
        Self {
            key: blake3::derive_key(KEY_CONTEXT, secret.as_bytes()),
            max_age_secs,
        }
    }

    /// Read a namespace from the request cookies. A missing cookie yields an
    /// empty session; an unverifiable one is an error.
    pub fn load(&self, headers: &HeaderMap, namespace: &str) -> Result<CookieSession, SessionError> {
        let mut session = CookieSession::new(namespace);
        if let Some(raw) = find_cookie(headers, namespace) {
            session.values = self.decode(namespace, raw, unix_now())?;
        }
        Ok(session)
    }

    /// Like [`load`](Self::load), but treats an unverifiable cookie as empty.
    pub fn get(&self, headers: &HeaderMap, namespace: &str) -> CookieSession {
        self.load(headers, namespace).unwrap_or_else(|e| {
            tracing::debug!(namespace, error = %e, "Discarding unreadable session cookie");
            CookieSession::new(namespace)
        })
    }

    /// `Set-Cookie` value persisting the session.
    pub fn save(&self, session: &CookieSession) -> Result<HeaderValue, SessionError> {
        let value = self.encode(&session.namespace, &session.values, unix_now());
        self.set_cookie(&session.namespace, &value, self.max_age_secs)
    }

    /// `Set-Cookie` value that deletes the namespace cookie immediately.
    pub fn expire(&self, namespace: &str) -> Result<HeaderValue, SessionError> {
        self.set_cookie(namespace, "", 0)
    }

    fn set_cookie(&self, namespace: &str, value: &str, max_age: u64) -> Result<HeaderValue, SessionError> {
        HeaderValue::from_str(&format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            namespace, value, max_age
        ))
        .map_err(|_| SessionError::InvalidName(namespace.to_string()))
    }

    fn mac(&self, namespace: &str, payload_hex: &str) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(namespace.as_bytes());
        hasher.update(b"|");
        hasher.update(payload_hex.as_bytes());
        hasher.finalize()
    }

    fn encode(&self, namespace: &str, values: &BTreeMap<String, String>, now: u64) -> String {
        let payload = Payload {
            values: values.clone(),
            issued_at: now,
        };
        // Serializing a map of strings cannot fail.
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        let payload_hex = hex::encode(json);
        let mac = self.mac(namespace, &payload_hex);
        format!("{}.{}", payload_hex, mac.to_hex())
    }

    fn decode(
        &self,
        namespace: &str,
        raw: &str,
        now: u64,
    ) -> Result<BTreeMap<String, String>, SessionError> {
        let malformed = || SessionError::Malformed(namespace.to_string());

        if raw.is_empty() {
            return Ok(BTreeMap::new());
        }
        let (payload_hex, mac_hex) = raw.split_once('.').ok_or_else(malformed)?;
        let presented = blake3::Hash::from_hex(mac_hex).map_err(|_| malformed())?;
        // blake3::Hash equality is constant-time.
        if presented != self.mac(namespace, payload_hex) {
            return Err(SessionError::Tampered(namespace.to_string()));
        }

        let json = hex::decode(payload_hex).map_err(|_| malformed())?;
        let payload: Payload = serde_json::from_slice(&json).map_err(|_| malformed())?;
        if now.saturating_sub(payload.issued_at) > self.max_age_secs {
            return Err(SessionError::Expired(namespace.to_string()));
        }
        Ok(payload.values)
    }
}

/// First cookie called `name` across every `Cookie` header.
fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Append `Set-Cookie` headers to an outgoing header map.
pub fn append_set_cookies(headers: &mut HeaderMap, cookies: impl IntoIterator<Item = HeaderValue>) {
    for cookie in cookies {
        headers.append(SET_COOKIE, cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new("unit-test-secret-value", 3600)
    }

    /// Turn a `Set-Cookie` value into a request `Cookie` header map.
    fn request_headers(set_cookie: &HeaderValue) -> HeaderMap {
        let pair = set_cookie.to_str().unwrap().split(';').next().unwrap().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&pair).unwrap());
        headers
    }

    #[test]
    fn saved_values_load_back() {
        let store = store();
        let mut session = CookieSession::new(AUTH);
        session.set(SESSION_UUID_KEY, "token-123");

        let headers = request_headers(&store.save(&session).unwrap());
        let loaded = store.load(&headers, AUTH).unwrap();
        assert_eq!(loaded.get(SESSION_UUID_KEY), Some("token-123"));
    }

    #[test]
    fn missing_cookie_is_empty() {
        let loaded = store().load(&HeaderMap::new(), AUTH).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.namespace(), AUTH);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let store = store();
        let mut session = CookieSession::new(AUTH);
        session.set(SESSION_UUID_KEY, "token-123");
        let value = store.encode(AUTH, &session.values, unix_now());

        let (payload, mac) = value.split_once('.').unwrap();
        let mut forged = CookieSession::new(AUTH);
        forged.set(SESSION_UUID_KEY, "someone-else");
        let forged_payload = store.encode(AUTH, &forged.values, unix_now());
        let forged_payload = forged_payload.split_once('.').unwrap().0;
        assert_ne!(payload, forged_payload);

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("auth={}.{}", forged_payload, mac)).unwrap(),
        );
        assert_eq!(
            store.load(&headers, AUTH),
            Err(SessionError::Tampered(AUTH.to_string()))
        );
        assert!(store.get(&headers, AUTH).is_empty());
    }

    #[test]
    fn cookie_signed_for_one_namespace_is_rejected_in_another() {
        let store = store();
        let mut session = CookieSession::new(FORMS);
        session.set("loginform", "abc");
        let value = store.encode(FORMS, &session.values, unix_now());

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&format!("auth={}", value)).unwrap());
        assert!(matches!(store.load(&headers, AUTH), Err(SessionError::Tampered(_))));
    }

    #[test]
    fn other_secret_cannot_verify() {
        let mut session = CookieSession::new(AUTH);
        session.set(SESSION_UUID_KEY, "token-123");
        let headers = request_headers(&store().save(&session).unwrap());

        let other = SessionStore::new("a-different-secret-value", 3600);
        assert!(matches!(other.load(&headers, AUTH), Err(SessionError::Tampered(_))));
    }

    #[test]
    fn old_cookies_expire() {
        let store = store();
        let value = store.encode(AUTH, &BTreeMap::new(), 1_000);
        assert_eq!(
            store.decode(AUTH, &value, 1_000 + 3601),
            Err(SessionError::Expired(AUTH.to_string()))
        );
        assert!(store.decode(AUTH, &value, 1_000 + 3600).is_ok());
    }

    #[test]
    fn garbage_is_malformed() {
        let store = store();
        assert!(matches!(store.decode(AUTH, "nodot", 0), Err(SessionError::Malformed(_))));
        assert!(matches!(store.decode(AUTH, "zz.zz", 0), Err(SessionError::Malformed(_))));
    }

    #[test]
    fn finds_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("forms=1; auth=two; passerrmsg=3"));
        assert_eq!(find_cookie(&headers, AUTH), Some("two"));
        assert_eq!(find_cookie(&headers, "missing"), None);
    }

    #[test]
    fn expire_sets_zero_max_age() {
        let value = store().expire(AUTH).unwrap();
        let value = value.to_str().unwrap();
        assert!(value.starts_with("auth=;"));
        assert!(value.contains("Max-Age=0"));
    }

    #[test]
    fn take_is_single_read() {
        let mut session = CookieSession::new(PASS_ERR_MSG);
        session.set(ERROR_MESSAGE_KEY, "bad password");
        assert_eq!(session.take(ERROR_MESSAGE_KEY).as_deref(), Some("bad password"));
        assert_eq!(session.take(ERROR_MESSAGE_KEY), None);
    }
}
