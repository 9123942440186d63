//! Identity collaborator: resolves the authenticated user from request
//! headers via the session store.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};

use crate::db::{AppState, Filter, collections};
use crate::error::{AppError, Result};
use crate::models::{Session, User};
use crate::util::cookie_value;

pub const SESSION_COOKIE: &str = "authjs.session-token";

/// Extract a bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Cookie")
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| cookie_value(cookies, SESSION_COOKIE))
        .map(String::from)
        .or_else(|| extract_bearer_token(headers).map(String::from))
}

/// `getCurrentUser`: session token → unexpired session → user, or None.
pub async fn get_current_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>> {
    let token = match session_token(headers) {
        Some(token) => token,
        None => return Ok(None),
    };

    let session = state
        .store
        .find(
            collections::SESSIONS,
            &Filter::eq("sessionToken", token),
            Some(1),
        )
        .await?
        .into_iter()
        .next()
        .and_then(|doc| serde_json::from_value::<Session>(doc).ok());

    let session = match session {
        Some(session) => session,
        None => return Ok(None),
    };

    if let Some(expires) = &session.expires {
        let expired = DateTime::parse_from_rfc3339(expires)
            .map(|dt| dt.with_timezone(&Utc) <= Utc::now())
            .unwrap_or(true);
        if expired {
            return Ok(None);
        }
    }

    let user = state
        .store
        .find(
            collections::USERS,
            &Filter::eq("id", session.user),
            Some(1),
        )
        .await?
        .into_iter()
        .next()
        .and_then(|doc| serde_json::from_value::<User>(doc).ok());

    Ok(user)
}

/// Middleware guarding the authenticated API surface; inserts the current
/// [`User`] as a request extension.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = get_current_user(&state, request.headers())
        .await?
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
