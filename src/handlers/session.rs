use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::middleware::SESSION_COOKIE;
use crate::util::parse_set_cookie;

/// Proxy a session refresh to the identity provider's session endpoint,
/// forwarding the caller's cookies and reshaping the reply into the token
/// payload clients expect. Any upstream failure reads as "not signed in".
pub async fn refresh_token(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let client = reqwest::Client::new();
    let mut request = client.get(&state.session_endpoint);
    if let Some(cookie) = headers.get(header::COOKIE) {
        request = request.header(header::COOKIE, cookie.clone());
    }

    let upstream = request.send().await.map_err(|e| {
        tracing::warn!("Session endpoint unreachable: {}", e);
        AppError::Unauthorized
    })?;
    if !upstream.status().is_success() {
        return Err(AppError::Unauthorized);
    }

    let set_cookies: Vec<String> = upstream
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(String::from))
        .collect();

    let body: Value = upstream.json().await.map_err(|_| AppError::Unauthorized)?;
    // The endpoint answers 200 with `null` or `{}` for anonymous callers.
    let user = match body.get("user") {
        Some(user) if !user.is_null() => user.clone(),
        _ => return Err(AppError::Unauthorized),
    };

    // The rotated token arrives as a Set-Cookie, possibly under a
    // "__Secure-" prefixed name.
    let session_cookie = set_cookies
        .iter()
        .filter_map(|h| parse_set_cookie(h))
        .find(|c| c.name.ends_with(SESSION_COOKIE));

    let mut payload = json!({
        "message": "Token refresh successful",
        "user": user,
    });
    if let Some(cookie) = &session_cookie {
        payload["refreshToken"] = json!(cookie.value);
        if let Some(exp) = cookie.expires {
            payload["exp"] = json!(exp);
        }
    }

    let mut response = Json(payload).into_response();
    for cookie in set_cookies {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    Ok(response)
}
