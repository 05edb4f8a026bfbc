//! Signed session cookies.
//!
//! A session value is `base64url("<user_id>|<expiry>") "." base64url(hmac)`.
//! The signing secret can be rotated at runtime; rotation invalidates every
//! outstanding session on its next request.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use xsshunter_core::{token, ErrorCode, User};

use crate::api::ApiError;
use crate::db::{Database, DbError};
use crate::state::SharedState;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";
pub const CSRF_HEADER: &str = "x-csrf-buster";

/// Settings-table key holding the current signing secret.
pub const SESSION_SECRET_SETTING: &str = "session_secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("malformed session value")]
    Malformed,

    #[error("bad session signature")]
    BadSignature,

    #[error("session expired")]
    Expired,

    #[error("unusable signing key")]
    BadKey,

    #[error("session key lock poisoned")]
    Poisoned,
}

pub struct SessionKeys {
    secret: RwLock<Arc<String>>,
    ttl_secs: i64,
}

impl SessionKeys {
    pub fn new(secret: String, ttl_hours: u64) -> Self {
        Self {
            secret: RwLock::new(Arc::new(secret)),
            ttl_secs: i64::try_from(ttl_hours.saturating_mul(3600)).unwrap_or(i64::MAX),
        }
    }

    fn current(&self) -> Result<Arc<String>, SessionError> {
        self.secret
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| SessionError::Poisoned)
    }

    fn sign(secret: &str, payload: &[u8]) -> Result<HmacSha256, SessionError> {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SessionError::BadKey)?;
        mac.update(payload);
        Ok(mac)
    }

    pub fn issue(&self, user_id: &str) -> Result<String, SessionError> {
        self.issue_with_expiry(user_id, Utc::now().timestamp().saturating_add(self.ttl_secs))
    }

    fn issue_with_expiry(&self, user_id: &str, expiry: i64) -> Result<String, SessionError> {
        let secret = self.current()?;
        let payload = format!("{user_id}|{expiry}");
        let tag = Self::sign(&secret, payload.as_bytes())?.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes()),
            URL_SAFE_NO_PAD.encode(tag)
        ))
    }

    /// Returns the user id the session was issued for.
    pub fn verify(&self, value: &str) -> Result<String, SessionError> {
        let secret = self.current()?;
        let (payload_b64, tag_b64) = value.split_once('.').ok_or(SessionError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| SessionError::Malformed)?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| SessionError::Malformed)?;

        Self::sign(&secret, &payload)?
            .verify_slice(&tag)
            .map_err(|_| SessionError::BadSignature)?;

        let payload = String::from_utf8(payload).map_err(|_| SessionError::Malformed)?;
        let (user_id, expiry) = payload.rsplit_once('|').ok_or(SessionError::Malformed)?;
        let expiry: i64 = expiry.parse().map_err(|_| SessionError::Malformed)?;
        if expiry <= Utc::now().timestamp() {
            return Err(SessionError::Expired);
        }
        Ok(user_id.to_string())
    }

    /// Generate a fresh secret and swap it in once `persist` has stored it.
    /// A failed `persist` leaves the current secret and its sessions valid.
    pub fn rotate<E>(&self, persist: impl FnOnce(&str) -> Result<(), E>) -> Result<String, E>
    where
        E: From<SessionError>,
    {
        let fresh = token::new_secret();
        let mut guard = self.secret.write().map_err(|_| SessionError::Poisoned)?;
        persist(&fresh)?;
        *guard = Arc::new(fresh.clone());
        Ok(fresh)
    }

    /// `Set-Cookie` value for a freshly issued session.
    pub fn cookie_header(&self, value: &str) -> String {
        format!(
            "{SESSION_COOKIE}={value}; Path=/; HttpOnly; Secure; SameSite=Strict; Max-Age={}",
            self.ttl_secs
        )
    }
}

/// Startup secret: a previously rotated one from the settings table wins over
/// the configured one. A configured secret is persisted on first use.
pub fn resolve_secret(db: &Database, configured: Option<&str>) -> Result<Option<String>, DbError> {
    if let Some(stored) = db.get_setting(SESSION_SECRET_SETTING)? {
        return Ok(Some(stored));
    }
    match configured {
        Some(secret) => {
            db.put_setting(SESSION_SECRET_SETTING, secret)?;
            Ok(Some(secret.to_string()))
        }
        None => Ok(None),
    }
}

/// Value of a named cookie from the `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

/// Authenticated control-panel user.
pub struct AdminUser(pub User);

#[axum::async_trait]
impl FromRequestParts<SharedState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(CSRF_HEADER) {
            return Err(ApiError::new(
                StatusCode::UNAUTHORIZED,
                ErrorCode::CsrfViolation,
                "missing CSRF header",
            ));
        }

        let not_authenticated = || {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                ErrorCode::NotAuthenticated,
                "not authenticated",
            )
        };

        let value = cookie_value(&parts.headers, SESSION_COOKIE).ok_or_else(not_authenticated)?;
        let user_id = state.sessions.verify(value).map_err(|e| {
            tracing::debug!(error = %e, "Session rejected");
            not_authenticated()
        })?;

        match state.db.find_user_by_id(&user_id) {
            Ok(Some(user)) => Ok(AdminUser(user)),
            Ok(None) => Err(not_authenticated()),
            Err(e) => Err(ApiError::internal(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new("s".repeat(64), 24)
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = keys();
        let value = keys.issue("user-1").unwrap();
        assert_eq!(keys.verify(&value).unwrap(), "user-1");
    }

    #[test]
    fn test_tampered_and_malformed() {
        let keys = keys();
        let value = keys.issue("user-1").unwrap();
        let (_, tag) = value.split_once('.').unwrap();
        let forged = format!("{}.{}", URL_SAFE_NO_PAD.encode("user-2|99999999999"), tag);
        assert_eq!(keys.verify(&forged), Err(SessionError::BadSignature));
        assert_eq!(keys.verify("garbage"), Err(SessionError::Malformed));
    }

    #[test]
    fn test_expired() {
        let keys = keys();
        let value = keys.issue_with_expiry("user-1", Utc::now().timestamp() - 1).unwrap();
        assert_eq!(keys.verify(&value), Err(SessionError::Expired));
    }

    #[test]
    fn test_rotation_invalidates_old_sessions() {
        let keys = keys();
        let old = keys.issue("user-1").unwrap();
        let mut persisted = None;
        let secret = keys
            .rotate(|s| {
                persisted = Some(s.to_string());
                Ok::<_, SessionError>(())
            })
            .unwrap();
        assert_eq!(secret.len(), token::SECRET_LEN);
        assert_eq!(persisted.as_deref(), Some(secret.as_str()));
        assert_eq!(keys.verify(&old), Err(SessionError::BadSignature));

        let fresh = keys.issue("user-1").unwrap();
        assert_eq!(keys.verify(&fresh).unwrap(), "user-1");
    }

    #[derive(Debug)]
    enum PersistError {
        Storage,
        Session,
    }

    impl From<SessionError> for PersistError {
        fn from(_: SessionError) -> Self {
            Self::Session
        }
    }

    #[test]
    fn test_failed_persist_keeps_current_secret() {
        let keys = keys();
        let old = keys.issue("user-1").unwrap();

        let err = keys.rotate(|_| Err(PersistError::Storage)).unwrap_err();
        assert!(matches!(err, PersistError::Storage));
        assert_eq!(keys.verify(&old).unwrap(), "user-1");
    }

    #[test]
    fn test_resolve_secret_prefers_stored() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(resolve_secret(&db, None).unwrap(), None);

        let configured = "c".repeat(40);
        assert_eq!(resolve_secret(&db, Some(&configured)).unwrap(), Some(configured.clone()));

        db.put_setting(SESSION_SECRET_SETTING, "rotated").unwrap();
        assert_eq!(
            resolve_secret(&db, Some(&configured)).unwrap(),
            Some("rotated".to_string())
        );
    }

    #[test]
    fn test_cookie_value_parsing() {
        let req = axum::http::Request::builder()
            .header("cookie", "theme=dark; session=abc.def")
            .body(())
            .unwrap();
        assert_eq!(cookie_value(req.headers(), "session"), Some("abc.def"));
        assert_eq!(cookie_value(req.headers(), "missing"), None);
    }
}
