//! Auth failures, classified where the auth endpoint answers.
//!
//! The auth service reports failures as `{"error_code": ..., "msg": ...}` or
//! the OAuth-style `{"error": ..., "error_description": ...}`. Each is mapped
//! once to an [`AuthErrorKind`] carrying a fixed user-facing message.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    InvalidCredentials,
    EmailNotConfirmed,
    UserAlreadyExists,
    WeakPassword,
    RateLimited,
    Other,
}

impl AuthErrorKind {
    /// Message shown to the user. `None` for [`AuthErrorKind::Other`],
    /// which keeps the service's own message.
    pub fn friendly_message(self) -> Option<&'static str> {
        match self {
            AuthErrorKind::InvalidCredentials => Some("Invalid email or password."),
            AuthErrorKind::EmailNotConfirmed => {
                Some("Please confirm your email address before signing in.")
            }
            AuthErrorKind::UserAlreadyExists => Some("An account with this email already exists."),
            AuthErrorKind::WeakPassword => Some("Password must be at least 6 characters long."),
            AuthErrorKind::RateLimited => {
                Some("Too many attempts. Please wait a moment and try again.")
            }
            AuthErrorKind::Other => None,
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "invalid_credentials" | "invalid_grant" => Some(AuthErrorKind::InvalidCredentials),
            "email_not_confirmed" => Some(AuthErrorKind::EmailNotConfirmed),
            "user_already_exists" | "email_exists" => Some(AuthErrorKind::UserAlreadyExists),
            "weak_password" => Some(AuthErrorKind::WeakPassword),
            "over_request_rate_limit" | "over_email_send_rate_limit" => {
                Some(AuthErrorKind::RateLimited)
            }
            _ => None,
        }
    }

    /// Fallback for older service versions that only send a message.
    fn from_message(message: &str) -> Self {
        let m = message.to_ascii_lowercase();
        if m.contains("invalid login credentials") {
            AuthErrorKind::InvalidCredentials
        } else if m.contains("email not confirmed") {
            AuthErrorKind::EmailNotConfirmed
        } else if m.contains("already registered") || m.contains("already exists") {
            AuthErrorKind::UserAlreadyExists
        } else if m.contains("password should be") {
            AuthErrorKind::WeakPassword
        } else if m.contains("rate limit") {
            AuthErrorKind::RateLimited
        } else {
            AuthErrorKind::Other
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
    pub status: u16,
}

#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    error_code: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>, status: u16) -> Self {
        Self {
            kind,
            message: message.into(),
            status,
        }
    }

    /// Classify a non-2xx auth response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: AuthErrorBody = serde_json::from_str(body).unwrap_or_default();
        let raw = parsed
            .msg
            .or(parsed.error_description)
            .or(parsed.message)
            .unwrap_or_else(|| body.trim().to_string());

        let kind = parsed
            .error_code
            .as_deref()
            .and_then(AuthErrorKind::from_code)
            .or_else(|| parsed.error.as_deref().and_then(AuthErrorKind::from_code))
            .unwrap_or_else(|| {
                if status == 429 {
                    AuthErrorKind::RateLimited
                } else {
                    AuthErrorKind::from_message(&raw)
                }
            });

        let message = match kind.friendly_message() {
            Some(friendly) => friendly.to_string(),
            None if raw.is_empty() => format!("Authentication failed (HTTP {status})"),
            None => raw,
        };
        Self::new(kind, message, status)
    }
}
