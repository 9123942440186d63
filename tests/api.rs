//! End-to-end tests for the authenticated API surface, with the payment
//! provider and the identity provider's session endpoint mocked at the
//! wire level.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use mockito::Matcher;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::*;

#[tokio::test]
async fn protected_routes_require_a_session() {
    let state = test_state("http://127.0.0.1:1", "http://127.0.0.1:1");
    let app = app(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/payments")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_sessions_are_rejected() {
    let state = test_state("http://127.0.0.1:1", "http://127.0.0.1:1");
    let user = state
        .store
        .create(
            account_portal::db::collections::USERS,
            json!({ "email": "a@example.com" }),
        )
        .await
        .unwrap();
    let expired = (Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    state
        .store
        .create(
            account_portal::db::collections::SESSIONS,
            json!({ "user": user["id"], "sessionToken": "stale", "expires": expired }),
        )
        .await
        .unwrap();

    let response = app(state).oneshot(get("/api/payments", "stale")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn checkout_without_a_customer_id_is_rejected() {
    let state = test_state("http://127.0.0.1:1", "http://127.0.0.1:1");
    let (token, _) = seed_user(&state, json!({ "email": "a@example.com" })).await;

    let response = app(state)
        .oneshot(send_json(
            "POST",
            "/api/create-checkout-session",
            &token,
            json!({ "priceId": "price_1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No Stripe customer ID found");
}

#[tokio::test]
async fn checkout_without_a_price_id_is_rejected() {
    let state = test_state("http://127.0.0.1:1", "http://127.0.0.1:1");
    let (token, _) = seed_user(
        &state,
        json!({ "email": "a@example.com", "stripeCustomerId": "cus_1" }),
    )
    .await;

    let response = app(state)
        .oneshot(send_json(
            "POST",
            "/api/create-checkout-session",
            &token,
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Price ID is required");
}

#[tokio::test]
async fn checkout_creates_a_provider_session() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/checkout/sessions")
        // The success URL must carry the provider's session-id template.
        .match_body(Matcher::Regex("CHECKOUT_SESSION_ID".to_string()))
        .with_body(json!({ "id": "cs_123", "url": "https://checkout.example/cs_123" }).to_string())
        .create_async()
        .await;

    let state = test_state(&server.url(), "http://127.0.0.1:1");
    let (token, _) = seed_user(
        &state,
        json!({ "email": "a@example.com", "stripeCustomerId": "cus_1" }),
    )
    .await;

    let response = app(state)
        .oneshot(send_json(
            "POST",
            "/api/create-checkout-session",
            &token,
            json!({ "priceId": "price_1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["sessionId"], "cs_123");
    mock.assert_async().await;
}

#[tokio::test]
async fn checkout_honors_nested_redirect_overrides() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/checkout/sessions")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded(
                "success_url".into(),
                "https://override.example/done?session_id={CHECKOUT_SESSION_ID}".into(),
            ),
            Matcher::UrlEncoded("cancel_url".into(), "https://override.example/canceled".into()),
        ]))
        .with_body(json!({ "id": "cs_456" }).to_string())
        .create_async()
        .await;

    let state = test_state(&server.url(), "http://127.0.0.1:1");
    let (token, _) = seed_user(
        &state,
        json!({ "email": "a@example.com", "stripeCustomerId": "cus_1" }),
    )
    .await;

    let response = app(state)
        .oneshot(send_json(
            "POST",
            "/api/create-checkout-session",
            &token,
            json!({
                "priceId": "price_1",
                "redirects": {
                    "success": "https://override.example/done",
                    "cancel": "https://override.example/canceled"
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["sessionId"], "cs_456");
    mock.assert_async().await;
}

#[tokio::test]
async fn payment_history_merges_charges_and_invoices() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/charges")
        .match_query(Matcher::UrlEncoded("customer".into(), "cus_1".into()))
        .with_body(
            json!({
                "data": [{
                    "id": "ch_1",
                    "amount": 1000,
                    "currency": "usd",
                    "status": "succeeded",
                    "created": 100,
                    "receipt_url": "https://receipts.example/ch_1"
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/v1/invoices")
        .match_query(Matcher::UrlEncoded("customer".into(), "cus_1".into()))
        .with_body(
            json!({
                "data": [{
                    "id": "in_1",
                    "amount_paid": 2000,
                    "currency": "usd",
                    "status": "paid",
                    "created": 200,
                    "hosted_invoice_url": "https://invoices.example/in_1"
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let state = test_state(&server.url(), "http://127.0.0.1:1");
    let (token, _) = seed_user(
        &state,
        json!({ "email": "a@example.com", "stripeCustomerId": "cus_1" }),
    )
    .await;

    let response = app(state).oneshot(get("/api/payments", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let payments = body["payments"].as_array().unwrap();
    let ids: Vec<&str> = payments.iter().map(|p| p["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["in_1", "ch_1"]);
    assert_eq!(payments[0]["invoiceUrl"], "https://invoices.example/in_1");
    assert_eq!(payments[1]["receiptUrl"], "https://receipts.example/ch_1");
}

#[tokio::test]
async fn payment_history_failure_maps_to_a_500() {
    // No mocks registered: every provider call fails.
    let server = mockito::Server::new_async().await;

    let state = test_state(&server.url(), "http://127.0.0.1:1");
    let (token, _) = seed_user(
        &state,
        json!({ "email": "a@example.com", "stripeCustomerId": "cus_1" }),
    )
    .await;

    let response = app(state).oneshot(get("/api/payments", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Failed to fetch payment history");
}

#[tokio::test]
async fn subscription_overview_reads_the_live_record() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/subscriptions")
        .match_query(Matcher::Any)
        .with_body(
            json!({
                "data": [{
                    "id": "sub_1",
                    "status": "active",
                    "customer": "cus_1",
                    "current_period_end": 1_700_000_000i64,
                    "items": { "data": [{
                        "id": "si_1",
                        "price": {
                            "id": "price_1",
                            "product": { "id": "prod_1", "name": "Pro Plan" },
                            "unit_amount": 1999,
                            "currency": "usd",
                            "type": "recurring",
                            "recurring": { "interval": "month" },
                            "active": true
                        }
                    }]}
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/v1/payment_methods")
        .match_query(Matcher::Any)
        .with_body(
            json!({
                "data": [{
                    "id": "pm_1",
                    "type": "card",
                    "card": { "brand": "visa", "last4": "4242", "exp_month": 12, "exp_year": 2030 }
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let state = test_state(&server.url(), "http://127.0.0.1:1");
    let (token, _) = seed_user(
        &state,
        json!({ "email": "a@example.com", "stripeCustomerId": "cus_1" }),
    )
    .await;

    let response = app(state).oneshot(get("/api/subscription", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["subscription"]["status"], "active");
    assert_eq!(body["subscription"]["statusColor"], "green");
    assert_eq!(body["subscription"]["productName"], "Pro Plan");
    assert_eq!(body["subscription"]["priceLabel"], "$19.99/month");
    assert_eq!(body["subscription"]["renewalDate"], "November 14, 2023");
    assert_eq!(body["paymentMethods"][0]["last4"], "4242");
}

#[tokio::test]
async fn subscription_success_rejects_other_customers_sessions() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/checkout/sessions/cs_x")
        .match_query(Matcher::Any)
        .with_body(
            json!({ "id": "cs_x", "customer": { "id": "cus_other", "metadata": {} } }).to_string(),
        )
        .create_async()
        .await;

    let state = test_state(&server.url(), "http://127.0.0.1:1");
    let (token, _) = seed_user(
        &state,
        json!({ "email": "a@example.com", "stripeCustomerId": "cus_1" }),
    )
    .await;

    let response = app(state)
        .oneshot(get("/api/subscription-success?session_id=cs_x", &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn refresh_token_reshapes_the_session_payload() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/auth/session")
        .with_header(
            "set-cookie",
            "authjs.session-token=newtok; Path=/; Expires=Tue, 14 Nov 2023 00:00:00 GMT; HttpOnly",
        )
        .with_body(
            json!({ "user": { "email": "a@example.com" }, "expires": "2030-01-01T00:00:00Z" })
                .to_string(),
        )
        .create_async()
        .await;

    let state = test_state(
        "http://127.0.0.1:1",
        &format!("{}/api/auth/session", server.url()),
    );

    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/refresh-token")
                .header("Cookie", "authjs.session-token=oldtok")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("authjs.session-token=newtok"));

    let body = body_json(response).await;
    assert_eq!(body["message"], "Token refresh successful");
    assert_eq!(body["refreshToken"], "newtok");
    assert_eq!(body["exp"], 1_699_920_000i64);
    assert_eq!(body["user"]["email"], "a@example.com");
}

#[tokio::test]
async fn refresh_token_is_unauthorized_without_a_session_user() {
    // Anonymous sessions arrive as an empty object from some identity
    // provider versions.
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/auth/session")
        .with_body("{}")
        .create_async()
        .await;

    let state = test_state(
        "http://127.0.0.1:1",
        &format!("{}/api/auth/session", server.url()),
    );

    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/refresh-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_token_is_unauthorized_for_anonymous_sessions() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/auth/session")
        .with_body("null")
        .create_async()
        .await;

    let state = test_state(
        "http://127.0.0.1:1",
        &format!("{}/api/auth/session", server.url()),
    );

    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/refresh-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_patches_only_supplied_fields() {
    let state = test_state("http://127.0.0.1:1", "http://127.0.0.1:1");
    let (token, user_id) = seed_user(
        &state,
        json!({ "email": "a@example.com", "name": "Ada", "phone": "111" }),
    )
    .await;

    let response = app(state.clone())
        .oneshot(send_json(
            "PATCH",
            "/api/profile",
            &token,
            json!({ "name": "Ada Lovelace", "companyName": "Analytical Engines" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], user_id.as_str());
    assert_eq!(body["name"], "Ada Lovelace");
    assert_eq!(body["companyName"], "Analytical Engines");
    assert_eq!(body["phone"], "111");
    assert_eq!(body["email"], "a@example.com");
}
