//! Wire-level tests for the customer identity sync.

use mockito::Matcher;
use serde_json::json;

use account_portal::billing::customer_sync::{WriteOperation, sync_user};
use account_portal::db::{Filter, collections};
use account_portal::models::User;

mod common;
use common::*;

#[tokio::test]
async fn first_persist_creates_a_provider_customer_and_stores_its_id() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/customers")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("email".into(), "a@example.com".into()),
            Matcher::UrlEncoded("metadata[uid]".into(), "uid-1".into()),
        ]))
        .with_body(json!({ "id": "cus_new", "metadata": { "uid": "uid-1" } }).to_string())
        .create_async()
        .await;

    let state = test_state(&server.url(), "http://127.0.0.1:1");
    let doc = state
        .store
        .create(
            collections::USERS,
            json!({ "email": "a@example.com", "uid": "uid-1" }),
        )
        .await
        .unwrap();
    let user: User = serde_json::from_value(doc).unwrap();

    sync_user(state.store.as_ref(), &state.stripe, &user, WriteOperation::Create).await;

    let stored = state
        .store
        .find(collections::USERS, &Filter::eq("id", user.id.as_str()), Some(1))
        .await
        .unwrap();
    assert_eq!(stored[0]["stripeCustomerId"], "cus_new");
    mock.assert_async().await;
}

#[tokio::test]
async fn updates_push_profile_fields_to_the_existing_customer() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/customers/cus_1")
        .match_body(Matcher::UrlEncoded("name".into(), "Ada Lovelace".into()))
        .with_body(json!({ "id": "cus_1", "metadata": {} }).to_string())
        .create_async()
        .await;

    let state = test_state(&server.url(), "http://127.0.0.1:1");
    let doc = state
        .store
        .create(
            collections::USERS,
            json!({
                "email": "a@example.com",
                "name": "Ada Lovelace",
                "uid": "uid-1",
                "stripeCustomerId": "cus_1"
            }),
        )
        .await
        .unwrap();
    let user: User = serde_json::from_value(doc).unwrap();

    sync_user(state.store.as_ref(), &state.stripe, &user, WriteOperation::Update).await;

    mock.assert_async().await;
}

#[tokio::test]
async fn provider_failure_never_fails_the_user_write() {
    // Unreachable provider: the sync logs and returns.
    let state = test_state("http://127.0.0.1:1", "http://127.0.0.1:1");
    let doc = state
        .store
        .create(
            collections::USERS,
            json!({ "email": "a@example.com", "uid": "uid-1" }),
        )
        .await
        .unwrap();
    let user: User = serde_json::from_value(doc).unwrap();

    sync_user(state.store.as_ref(), &state.stripe, &user, WriteOperation::Create).await;

    let stored = state
        .store
        .find(collections::USERS, &Filter::eq("id", user.id.as_str()), Some(1))
        .await
        .unwrap();
    assert!(stored[0].get("stripeCustomerId").is_none());
}
