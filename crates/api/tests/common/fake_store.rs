//! In-process stand-in for the hosted backend store, served on a local port
//! so the real `StoreClient` talks HTTP to it.

use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

pub const PASSWORD: &str = "correct-horse";
pub const USER_ID: &str = "user-1";
pub const ACCESS_TOKEN: &str = "access-1";
pub const TAKEN_EMAIL: &str = "taken@example.com";

#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub bucket: String,
    pub path: String,
    pub content_type: String,
    pub size: usize,
}

/// What the fake store has received.
#[derive(Clone, Default)]
pub struct FakeStore {
    pub uploads: Arc<Mutex<Vec<Upload>>>,
    pub rows: Arc<Mutex<Vec<Value>>>,
    pub revoked: Arc<Mutex<Vec<String>>>,
}

impl FakeStore {
    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

/// Start the fake store and return its base URL.
pub async fn spawn() -> (String, FakeStore) {
    let store = FakeStore::default();
    let app = Router::new()
        .route("/auth/v1/signup", post(sign_up))
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/logout", post(logout))
        .route("/storage/v1/object/{bucket}/{*path}", post(upload))
        .route("/rest/v1/saved_images", get(list_rows).post(insert_row))
        .with_state(store.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), store)
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"message": "invalid JWT"})),
    )
}

async fn sign_up(Json(body): Json<Value>) -> impl IntoResponse {
    if body["email"] == TAKEN_EMAIL {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"code": 422, "error_code": "user_already_exists", "msg": "User already registered"})),
        );
    }
    (StatusCode::OK, Json(json!({"id": "user-2", "email": body["email"]})))
}

async fn token(Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] != PASSWORD {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid login credentials"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "access_token": ACCESS_TOKEN,
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "user": {"id": USER_ID, "email": body["email"]}
        })),
    )
}

async fn logout(State(store): State<FakeStore>, headers: HeaderMap) -> StatusCode {
    match bearer(&headers) {
        Some(token) => {
            store.revoked.lock().unwrap().push(token);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::UNAUTHORIZED,
    }
}

async fn upload(
    State(store): State<FakeStore>,
    Path((bucket, path)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if bearer(&headers).as_deref() != Some(ACCESS_TOKEN) {
        return unauthorized();
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let key = format!("{bucket}/{path}");
    store.uploads.lock().unwrap().push(Upload {
        bucket,
        path,
        content_type,
        size: body.len(),
    });
    (StatusCode::OK, Json(json!({"Key": key})))
}

async fn insert_row(
    State(store): State<FakeStore>,
    headers: HeaderMap,
    Json(mut row): Json<Value>,
) -> impl IntoResponse {
    if bearer(&headers).as_deref() != Some(ACCESS_TOKEN) {
        return unauthorized();
    }
    let mut rows = store.rows.lock().unwrap();
    row["id"] = json!(rows.len() + 1);
    row["created_at"] = json!("2024-05-01T10:00:00Z");
    rows.push(row.clone());
    (StatusCode::CREATED, Json(json!([row])))
}

async fn list_rows(State(store): State<FakeStore>, headers: HeaderMap) -> impl IntoResponse {
    if bearer(&headers).as_deref() != Some(ACCESS_TOKEN) {
        return unauthorized();
    }
    let rows = store.rows.lock().unwrap().iter().rev().cloned().collect::<Vec<_>>();
    (StatusCode::OK, Json(Value::Array(rows)))
}
