//! Errors from the generative API layer.
//!
//! Every error carries an [`ErrorKind`] decided where the failure is first
//! observed (HTTP status, API status string, finish reason), so callers
//! branch on the kind instead of matching message text.

use std::sync::LazyLock;

use atelier_core::error::CoreError;
use regex::Regex;

/// User-facing message once rate-limit retries are exhausted.
pub const QUOTA_EXCEEDED_MESSAGE: &str =
    "API quota exceeded. Please check your plan and billing details.";

static RATE_LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(429|quota|rate[ _-]?limit(ed)?|resource[ _]exhausted)\b")
        .expect("rate limit pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Transient rate-limit / quota condition; retried with backoff.
    RateLimited,
    /// Missing, invalid or unauthorized API key.
    Auth,
    /// The prompt or output was blocked by a safety filter.
    SafetyBlocked,
    /// The API answered but produced nothing usable.
    EmptyResult,
    /// The model returned text that is not the JSON we asked for.
    MalformedJson,
    /// A long-running operation did not finish in time.
    Timeout,
    /// Any other API-reported error.
    Api,
    /// Network, DNS, TLS or body decoding failure.
    Transport,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct GenAiError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
}

impl GenAiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == ErrorKind::RateLimited
    }

    pub fn safety_blocked(reason: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorKind::SafetyBlocked,
            format!("Generation was blocked by the safety filter ({reason})"),
        )
    }

    pub fn empty_result(what: &str) -> Self {
        Self::new(ErrorKind::EmptyResult, format!("The model returned no {what}"))
    }

    pub fn malformed_json(err: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorKind::MalformedJson,
            format!("The model returned malformed JSON: {err}"),
        )
    }

    /// Same kind and status, user-facing quota message.
    pub fn into_quota_exhausted(self) -> Self {
        Self {
            message: QUOTA_EXCEEDED_MESSAGE.to_string(),
            ..self
        }
    }

    /// Build an error from a non-2xx response.
    ///
    /// The message is the API's `error.message` when present; otherwise the
    /// JSON body is stringified, and a non-JSON body is used verbatim.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();

        let api_error = parsed.as_ref().and_then(|v| v.get("error"));
        let api_status = api_error
            .and_then(|e| e.get("status"))
            .and_then(|s| s.as_str())
            .unwrap_or_default();
        let message = api_error
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .or_else(|| parsed.as_ref().map(|v| v.to_string()))
            .unwrap_or_else(|| body.trim().to_string());
        let message = if message.is_empty() {
            format!("HTTP {status}")
        } else {
            message
        };

        let kind = if status == 429 || api_status == "RESOURCE_EXHAUSTED" {
            ErrorKind::RateLimited
        } else if status == 401
            || status == 403
            || matches!(api_status, "UNAUTHENTICATED" | "PERMISSION_DENIED")
            || message.contains("API key not valid")
        {
            ErrorKind::Auth
        } else if RATE_LIMIT_RE.is_match(&message) {
            ErrorKind::RateLimited
        } else {
            ErrorKind::Api
        };

        Self::new(kind, message).with_status(status)
    }
}

impl From<reqwest::Error> for GenAiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::new(ErrorKind::MalformedJson, format!("unexpected response body: {err}"));
        }
        let status = err.status().map(|s| s.as_u16());
        let e = Self::new(ErrorKind::Transport, format!("HTTP request failed: {err}"));
        match status {
            Some(s) => e.with_status(s),
            None => e,
        }
    }
}

impl From<CoreError> for GenAiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingApiKey => Self::new(ErrorKind::Auth, err.to_string()),
            other => Self::new(ErrorKind::Api, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_rate_limited() {
        let e = GenAiError::from_response(429, r#"{"error":{"code":429,"message":"slow down"}}"#);
        assert_eq!(e.kind(), ErrorKind::RateLimited);
        assert_eq!(e.message(), "slow down");
        assert_eq!(e.status(), Some(429));
    }

    #[test]
    fn resource_exhausted_status_is_rate_limited() {
        let e = GenAiError::from_response(
            400,
            r#"{"error":{"message":"x","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(e.is_rate_limited());
    }

    #[test]
    fn quota_message_is_rate_limited() {
        let e = GenAiError::from_response(500, r#"{"error":{"message":"You exceeded your current quota"}}"#);
        assert!(e.is_rate_limited());
    }

    #[test]
    fn invalid_key_is_auth() {
        let e = GenAiError::from_response(
            400,
            r#"{"error":{"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#,
        );
        assert_eq!(e.kind(), ErrorKind::Auth);
    }

    #[test]
    fn json_without_message_is_stringified() {
        let e = GenAiError::from_response(500, r#"{"detail": {"code": 7}}"#);
        assert_eq!(e.kind(), ErrorKind::Api);
        assert_eq!(e.message(), r#"{"detail":{"code":7}}"#);
    }

    #[test]
    fn plain_body_used_verbatim() {
        let e = GenAiError::from_response(502, " Bad Gateway ");
        assert_eq!(e.message(), "Bad Gateway");
        let e = GenAiError::from_response(503, "");
        assert_eq!(e.message(), "HTTP 503");
    }

    #[test]
    fn quota_rewrite_keeps_kind() {
        let e = GenAiError::from_response(429, "{}").into_quota_exhausted();
        assert!(e.is_rate_limited());
        assert_eq!(e.to_string(), QUOTA_EXCEEDED_MESSAGE);
    }

    #[test]
    fn missing_key_maps_to_auth() {
        let e: GenAiError = CoreError::MissingApiKey.into();
        assert_eq!(e.kind(), ErrorKind::Auth);
    }
}
