//! Application context: the generative API key and the signed-in session.
//!
//! Populated at startup (from the environment) or by the sign-in flow and
//! cleared on sign-out. Anything that issues external calls receives the
//! context explicitly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Environment variables checked, in order, for the generative API key.
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

/// An authenticated backend-store session.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: String,
    pub email: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<Timestamp>,
}

impl AuthSession {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct AppContext {
    api_key: Option<String>,
    session: Option<AuthSession>,
}

impl AppContext {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            session: None,
        }
    }

    /// Read the API key from the first non-empty variable in
    /// [`API_KEY_ENV_VARS`].
    pub fn from_env() -> Self {
        let key = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.trim().is_empty());
        Self::new(key)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The API key, or [`CoreError::MissingApiKey`]. Checked before every
    /// generation call.
    pub fn require_api_key(&self) -> Result<&str, CoreError> {
        self.api_key.as_deref().ok_or(CoreError::MissingApiKey)
    }

    pub fn set_api_key(&mut self, key: impl Into<String>) -> Result<(), CoreError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CoreError::Validation("API key must not be empty".to_string()));
        }
        self.api_key = Some(key.trim().to_string());
        Ok(())
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    /// The current session if present and unexpired.
    pub fn require_session(&self, now: Timestamp) -> Result<&AuthSession, CoreError> {
        match &self.session {
            Some(s) if !s.is_expired(now) => Ok(s),
            Some(_) => Err(CoreError::Unauthorized("session expired, sign in again".to_string())),
            None => Err(CoreError::Unauthorized("not signed in".to_string())),
        }
    }

    pub fn sign_in(&mut self, session: AuthSession) {
        tracing::info!(user_id = %session.user_id, "Session started");
        self.session = Some(session);
    }

    /// Drop the session. The API key stays configured.
    pub fn sign_out(&mut self) -> Option<AuthSession> {
        let session = self.session.take();
        if let Some(s) = &session {
            tracing::info!(user_id = %s.user_id, "Session ended");
        }
        session
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    fn session(expires_in: i64) -> AuthSession {
        AuthSession {
            user_id: "u-1".into(),
            email: Some("a@b.c".into()),
            access_token: "secret-token".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::seconds(expires_in)),
        }
    }

    #[test]
    fn missing_key_is_blocking() {
        let ctx = AppContext::new(None);
        assert_matches!(ctx.require_api_key(), Err(CoreError::MissingApiKey));
    }

    #[test]
    fn blank_key_treated_as_missing() {
        let ctx = AppContext::new(Some("  ".into()));
        assert!(!ctx.has_api_key());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut ctx = AppContext::new(Some("sk-live-123".into()));
        ctx.sign_in(session(60));
        let dbg = format!("{ctx:?}");
        assert!(!dbg.contains("sk-live-123"));
        assert!(!dbg.contains("secret-token"));
    }

    #[test]
    fn sign_out_clears_session_keeps_key() {
        let mut ctx = AppContext::new(Some("k".into()));
        ctx.sign_in(session(60));
        assert!(ctx.require_session(Utc::now()).is_ok());

        assert!(ctx.sign_out().is_some());
        assert_matches!(ctx.require_session(Utc::now()), Err(CoreError::Unauthorized(_)));
        assert_eq!(ctx.api_key(), Some("k"));
    }

    #[test]
    fn expired_session_rejected() {
        let mut ctx = AppContext::default();
        ctx.sign_in(session(-5));
        assert_matches!(ctx.require_session(Utc::now()), Err(CoreError::Unauthorized(_)));
    }
}
