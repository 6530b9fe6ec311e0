//! REST client for the hosted backend store.
//!
//! Three services sit behind one base URL:
//!
//! | Prefix         | Service                         |
//! |----------------|---------------------------------|
//! | `/auth/v1`     | email/password auth, sessions   |
//! | `/storage/v1`  | object storage buckets          |
//! | `/rest/v1`     | table rows (saved-image records)|

use atelier_core::context::AuthSession;
use atelier_core::error::CoreError;
use serde::Deserialize;

use crate::auth::AuthError;
use crate::error::StoreError;
use crate::images::{NewSavedImage, SavedImage, SAVED_IMAGES_TABLE};

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub anon_key: String,
}

impl StoreConfig {
    /// Load store settings from environment variables.
    ///
    /// | Env Var          | Required | Default |
    /// |------------------|----------|---------|
    /// | `STORE_URL`      | no       | --      |
    /// | `STORE_ANON_KEY` | no       | --      |
    ///
    /// Returns `None` unless both are set; the store is optional.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("STORE_URL").ok().filter(|v| !v.is_empty())?;
        let anon_key = std::env::var("STORE_ANON_KEY").ok().filter(|v| !v.is_empty())?;
        Some(Self { url, anon_key })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    email: Option<String>,
}

pub struct StoreClient {
    client: reqwest::Client,
    url: String,
    anon_key: String,
}

impl StoreClient {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: StoreConfig) -> Self {
        Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key,
        }
    }

    // ---- auth ----

    /// Register a new account. Depending on the project settings the
    /// account may need email confirmation before [`sign_in`](Self::sign_in)
    /// succeeds.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/signup", self.url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        Self::ensure_auth_success(response).await?;
        tracing::info!(email, "Account registered");
        Ok(())
    }

    /// Password grant. Returns a session ready for
    /// [`AppContext::sign_in`](atelier_core::context::AppContext::sign_in).
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, StoreError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token?grant_type=password", self.url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let response = Self::ensure_auth_success(response).await?;
        let token: TokenResponse = response.json().await?;

        Ok(AuthSession {
            user_id: token.user.id,
            email: token.user.email,
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .map(|secs| chrono::Utc::now() + chrono::Duration::seconds(secs)),
        })
    }

    /// Revoke the session's refresh tokens.
    pub async fn sign_out(&self, session: &AuthSession) -> Result<(), StoreError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/logout", self.url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        Self::ensure_auth_success(response).await?;
        Ok(())
    }

    // ---- storage ----

    /// Upload (or overwrite) an object and return its public URL.
    pub async fn upload_object(
        &self,
        session: &AuthSession,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        if path.is_empty() || path.starts_with('/') {
            return Err(CoreError::Validation(format!("invalid object path '{path}'")).into());
        }
        let response = self
            .client
            .post(format!("{}/storage/v1/object/{}/{}", self.url, bucket, path))
            .header("apikey", &self.anon_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .bearer_auth(&session.access_token)
            .body(bytes)
            .send()
            .await?;
        Self::ensure_success(response).await?;

        let url = self.public_url(bucket, path);
        tracing::debug!(bucket, path, "Object uploaded");
        Ok(url)
    }

    pub fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.url, bucket, path)
    }

    // ---- saved images ----

    pub async fn insert_saved_image(
        &self,
        session: &AuthSession,
        image: &NewSavedImage,
    ) -> Result<SavedImage, StoreError> {
        let response = self
            .client
            .post(format!("{}/rest/v1/{}", self.url, SAVED_IMAGES_TABLE))
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(&session.access_token)
            .json(image)
            .send()
            .await?;
        let mut rows: Vec<SavedImage> = Self::parse_response(response).await?;
        rows.pop().ok_or_else(|| {
            StoreError::Core(CoreError::Internal("insert returned no row".to_string()))
        })
    }

    /// The signed-in user's saved images, newest first.
    pub async fn list_saved_images(
        &self,
        session: &AuthSession,
    ) -> Result<Vec<SavedImage>, StoreError> {
        let response = self
            .client
            .get(format!("{}/rest/v1/{}", self.url, SAVED_IMAGES_TABLE))
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", session.user_id)),
                ("order", "created_at.desc".to_string()),
            ])
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    async fn read_body(response: reqwest::Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string())
    }

    async fn ensure_auth_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = Self::read_body(response).await;
            let err = AuthError::from_response(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), kind = ?err.kind, "Auth request rejected");
            return Err(err.into());
        }
        Ok(response)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = Self::read_body(response).await;
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StoreError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
