//! Shared helpers for integration tests: an in-memory app state, seeded
//! users with live sessions, and request plumbing.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use chrono::Utc;
use serde_json::{Value, json};

use account_portal::db::{AppState, SqliteStore, collections, init_db, new_memory_pool};
use account_portal::handlers;
use account_portal::stripe::StripeClient;

pub const SITE_URL: &str = "https://portal.example";

pub fn test_state(stripe_base: &str, session_endpoint: &str) -> AppState {
    let pool = new_memory_pool();
    init_db(&pool.get().unwrap()).unwrap();

    AppState {
        store: Arc::new(SqliteStore::new(pool)),
        stripe: Arc::new(
            StripeClient::with_base("sk_test_x", stripe_base, Duration::from_secs(2)).unwrap(),
        ),
        site_url: SITE_URL.to_string(),
        session_endpoint: session_endpoint.to_string(),
    }
}

pub fn app(state: AppState) -> Router {
    handlers::router(state)
}

/// Create a user document and a one-hour session for it; returns the
/// session token and the user's id.
pub async fn seed_user(state: &AppState, user: Value) -> (String, String) {
    let doc = state.store.create(collections::USERS, user).await.unwrap();
    let user_id = doc["id"].as_str().unwrap().to_string();

    let token = format!("tok-{}", user_id);
    let expires = (Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
    state
        .store
        .create(
            collections::SESSIONS,
            json!({ "user": user_id, "sessionToken": token, "expires": expires }),
        )
        .await
        .unwrap();

    (token, user_id)
}

pub fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("Cookie", format!("authjs.session-token={}", token))
        .body(Body::empty())
        .unwrap()
}

pub fn send_json(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Cookie", format!("authjs.session-token={}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
