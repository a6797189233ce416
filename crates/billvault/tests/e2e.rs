// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the HTTP routes.
//!
//! Each test builds an isolated TestHarness and drives the router in-process.
//! Tests are independent and order-insensitive.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use billvault::server::{self, AppState};
use billvault_billing::signature::SIGNATURE_HEADER;
use billvault_billing::{ProviderClient, SignatureVerifier, SubscriptionLookup};
use billvault_test_utils::TestHarness;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "whsec_e2e";

fn app(harness: &TestHarness) -> Router {
    app_with_lookup(harness, None)
}

fn app_with_lookup(harness: &TestHarness, lookup: Option<Arc<dyn SubscriptionLookup>>) -> Router {
    let state = AppState {
        vault: harness.vault.clone(),
        query: harness.query.clone(),
        reconciler: harness.reconciler.clone(),
        subscriptions: harness.subscriptions.clone(),
        verifier: SignatureVerifier::from_config(&harness.config.billing).map(Arc::new),
        lookup,
    };
    server::router(
        state,
        server::body_limit(harness.config.vault.max_payload_bytes),
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn get(uri: &str, user: &str) -> Request<Body> {
    Request::get(uri)
        .header("x-user-id", user)
        .body(Body::empty())
        .unwrap()
}

fn with_json(method: &str, uri: &str, user: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", user)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bill_upload(filename: &str, bytes: &[u8]) -> Value {
    json!({
        "type": "bill",
        "tags": ["utilities"],
        "payload": {
            "filename": filename,
            "contentType": "application/pdf",
            "data": BASE64.encode(bytes),
        }
    })
}

// ---- Health and identity ----

#[tokio::test]
async fn health_reports_both_stores() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["vault"], "healthy");
    assert_eq!(body["subscriptions"], "healthy");
}

#[tokio::test]
async fn vault_routes_require_caller_header() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let request = Request::get("/api/vault").body(Body::empty()).unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::get("/api/subscription")
        .header("x-user-id", "  ")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ---- Vault lifecycle ----

#[tokio::test]
async fn upload_list_download_and_delete() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let (status, created) = send_json(
        &app,
        with_json("POST", "/api/vault", "alice", bill_upload("../march.pdf", b"%PDF-1.7 march")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["filename"], "march.pdf");
    assert_eq!(created["type"], "bill");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, listed) = send_json(&app, get("/api/vault", "alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/vault/{id}/download"), "alice"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"march.pdf\""
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.7 march");

    let (status, deleted) = send_json(
        &app,
        with_json("POST", "/api/vault/bulk-delete", "alice", json!({"ids": [id]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted"], 1);

    let (_, listed) = send_json(&app, get("/api/vault", "alice")).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn other_users_items_are_invisible_and_forbidden() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let (_, created) = send_json(
        &app,
        with_json("POST", "/api/vault", "alice", bill_upload("a.pdf", b"alice")),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (_, listed) = send_json(&app, get("/api/vault", "mallory")).await;
    assert!(listed.as_array().unwrap().is_empty());

    let (status, _) = send(&app, get(&format!("/api/vault/{id}/download"), "mallory")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, get("/api/vault/missing/download", "alice")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        with_json(
            "PUT",
            &format!("/api/vault/{id}/tags"),
            "mallory",
            json!({"tags": ["mine"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, deleted) = send_json(
        &app,
        with_json("POST", "/api/vault/bulk-delete", "mallory", json!({"ids": [id]})),
    )
    .await;
    assert_eq!(deleted["deleted"], 0);
}

#[tokio::test]
async fn invalid_uploads_are_rejected() {
    let harness = TestHarness::builder()
        .with_max_payload_bytes(8)
        .build()
        .await
        .unwrap();
    let app = app(&harness);

    let (status, body) = send_json(
        &app,
        with_json("POST", "/api/vault", "alice", bill_upload("big.pdf", b"0123456789")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("validation"));

    let (status, _) = send(
        &app,
        with_json("POST", "/api/vault", "alice", json!({"type": "receipt"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut not_base64 = bill_upload("a.pdf", b"x");
    not_base64["payload"]["data"] = json!("%%%");
    let (status, _) = send(&app, with_json("POST", "/api/vault", "alice", not_base64)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(harness.vault.list_items(&"alice".into()).await.unwrap().is_empty());
}

#[tokio::test]
async fn policy_save_and_filtered_search() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let (status, policy) = send_json(
        &app,
        with_json(
            "POST",
            "/api/vault-policy",
            "alice",
            json!({"metadata": {"planName": "Gold", "deductible": 500}, "rawText": "Policy terms"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(policy["type"], "policy");
    assert_eq!(policy["metadata"]["deductible"], "500");

    send(
        &app,
        with_json(
            "POST",
            "/api/vault",
            "alice",
            json!({"type": "letter", "content": "Dear Sir", "tags": ["mail"]}),
        ),
    )
    .await;

    let (_, hits) = send_json(&app, get("/api/vault?q=gold", "alice")).await;
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["id"], policy["id"]);

    let (_, hits) = send_json(&app, get("/api/vault?type=letter&tags=mail", "alice")).await;
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["content"], "Dear Sir");

    let (status, _) = send(&app, get("/api/vault?type=memo", "alice")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_tags_and_tag_listing() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let mut ids = Vec::new();
    for name in ["a.pdf", "b.pdf"] {
        let (_, created) = send_json(
            &app,
            with_json("POST", "/api/vault", "alice", bill_upload(name, name.as_bytes())),
        )
        .await;
        ids.push(created["id"].clone());
    }

    let (status, updated) = send_json(
        &app,
        with_json(
            "POST",
            "/api/vault/bulk-tags",
            "alice",
            json!({"ids": ids, "tags": ["2024", "Tax"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["updated"], 2);

    let (_, tags) = send_json(&app, get("/api/vault/tags", "alice")).await;
    assert_eq!(tags["tags"], json!(["2024", "Tax", "utilities"]));

    let (status, item) = send_json(
        &app,
        with_json(
            "PUT",
            &format!("/api/vault/{}/tags", ids[0].as_str().unwrap()),
            "alice",
            json!({"tags": ["only"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["tags"], json!(["only"]));
}

#[tokio::test]
async fn archive_download_is_gzip() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let (_, created) = send_json(
        &app,
        with_json("POST", "/api/vault", "alice", bill_upload("a.pdf", b"one")),
    )
    .await;

    let response = app
        .clone()
        .oneshot(with_json(
            "POST",
            "/api/vault/archive",
            "alice",
            json!({"ids": [created["id"]]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/gzip");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);

    let (status, _) = send(
        &app,
        with_json("POST", "/api/vault/archive", "mallory", json!({"ids": [created["id"]]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---- Webhooks and subscriptions ----

fn signed_webhook(body: &Value, secret: &str) -> Request<Body> {
    let raw = body.to_string();
    let now = chrono::Utc::now().timestamp();
    let verifier = SignatureVerifier::new(secret, std::time::Duration::from_secs(300));
    let signature = verifier.sign(now, raw.as_bytes()).unwrap();
    Request::post("/api/webhook")
        .header(SIGNATURE_HEADER, signature)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(raw))
        .unwrap()
}

fn checkout_envelope(user: &str, subscription: &str, created: i64) -> Value {
    json!({
        "id": format!("evt_{created}"),
        "type": "checkout.session.completed",
        "created": created,
        "data": {"object": {
            "customer": format!("cus_{user}"),
            "metadata": {"userId": user},
            "subscription": {
                "id": subscription,
                "status": "active",
                "current_period_start": created,
                "current_period_end": created + 2_592_000
            }
        }}
    })
}

#[tokio::test]
async fn webhook_checkout_then_cancel() {
    let harness = TestHarness::builder()
        .with_webhook_secret(SECRET)
        .build()
        .await
        .unwrap();
    let app = app(&harness);
    let t0 = 1_700_000_000;

    let (status, ack) = send_json(
        &app,
        signed_webhook(&checkout_envelope("alice", "sub_1", t0), SECRET),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "created");

    let (_, sub) = send_json(&app, get("/api/subscription", "alice")).await;
    assert_eq!(sub["subscription"]["status"], "active");
    assert_eq!(sub["subscription"]["subscription_ref"], "sub_1");

    let cancel = json!({
        "id": "evt_cancel",
        "type": "customer.subscription.deleted",
        "created": t0 + 100,
        "data": {"object": {
            "id": "sub_1", "customer": "cus_alice", "status": "canceled",
            "current_period_start": t0, "current_period_end": t0 + 2_592_000
        }}
    });
    let (status, ack) = send_json(&app, signed_webhook(&cancel, SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "applied");

    // A late update older than the cancellation is acknowledged but dropped.
    let late = json!({
        "type": "customer.subscription.updated",
        "created": t0 + 50,
        "data": {"object": {
            "id": "sub_1", "status": "active",
            "current_period_start": t0, "current_period_end": t0 + 2_592_000
        }}
    });
    let (status, ack) = send_json(&app, signed_webhook(&late, SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "stale");

    let (_, sub) = send_json(&app, get("/api/subscription", "alice")).await;
    assert_eq!(sub["subscription"]["status"], "canceled");

    let (_, none) = send_json(&app, get("/api/subscription", "bob")).await;
    assert_eq!(none["subscription"], Value::Null);
}

#[tokio::test]
async fn webhook_signature_and_payload_rejections() {
    let harness = TestHarness::builder()
        .with_webhook_secret(SECRET)
        .build()
        .await
        .unwrap();
    let app = app(&harness);
    let body = checkout_envelope("alice", "sub_1", 1_700_000_000);

    let (status, _) = send(&app, signed_webhook(&body, "whsec_wrong")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unsigned = Request::post("/api/webhook")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, _) = send(&app, unsigned).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut missing_user = body.clone();
    missing_user["data"]["object"]["metadata"] = json!({});
    let (status, _) = send(&app, signed_webhook(&missing_user, SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let unknown = json!({"type": "charge.refunded", "created": 1, "data": {"object": {}}});
    let (status, ack) = send_json(&app, signed_webhook(&unknown, SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "ignored");

    let (_, sub) = send_json(&app, get("/api/subscription", "alice")).await;
    assert_eq!(sub["subscription"], Value::Null);
}

#[tokio::test]
async fn webhooks_rejected_without_configured_secret() {
    let harness = TestHarness::builder().build().await.unwrap();
    let app = app(&harness);

    let body = checkout_envelope("alice", "sub_1", 1_700_000_000);
    let (status, _) = send(&app, signed_webhook(&body, SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn bare_checkout_envelope(user: &str, subscription: &str, created: i64) -> Value {
    json!({
        "id": format!("evt_{created}"),
        "type": "checkout.session.completed",
        "created": created,
        "data": {"object": {
            "customer": format!("cus_{user}"),
            "metadata": {"userId": user},
            "subscription": subscription
        }}
    })
}

#[tokio::test]
async fn checkout_with_bare_subscription_id_is_resolved_through_provider() {
    let provider = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/subscriptions/sub_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sub_1",
            "status": "trialing",
            "customer": "cus_alice",
            "current_period_start": 1_700_000_000,
            "current_period_end": 1_702_592_000
        })))
        .mount(&provider)
        .await;

    let harness = TestHarness::builder()
        .with_webhook_secret(SECRET)
        .build()
        .await
        .unwrap();
    let client = ProviderClient::new(
        "sk_test_e2e",
        &format!("{}/v1", provider.uri()),
        std::time::Duration::from_secs(5),
    )
    .unwrap();
    let lookup: Arc<dyn SubscriptionLookup> = Arc::new(client);
    let app = app_with_lookup(&harness, Some(lookup));
    let t0 = 1_700_000_000;
    let checkout = bare_checkout_envelope("alice", "sub_1", t0);

    let (status, ack) = send_json(&app, signed_webhook(&checkout, SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "created");

    let (_, sub) = send_json(&app, get("/api/subscription", "alice")).await;
    assert_eq!(sub["subscription"]["status"], "trialing");
    assert_eq!(sub["subscription"]["subscription_ref"], "sub_1");

    // Later events now find the record.
    let cancel = json!({
        "type": "customer.subscription.deleted",
        "created": t0 + 100,
        "data": {"object": {
            "id": "sub_1", "status": "canceled",
            "current_period_start": t0, "current_period_end": t0 + 2_592_000
        }}
    });
    let (_, ack) = send_json(&app, signed_webhook(&cancel, SECRET)).await;
    assert_eq!(ack["outcome"], "applied");

    // The checkout redelivered after the cancellation changes nothing.
    let (status, ack) = send_json(&app, signed_webhook(&checkout, SECRET)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["outcome"], "stale");
    let (_, sub) = send_json(&app, get("/api/subscription", "alice")).await;
    assert_eq!(sub["subscription"]["status"], "canceled");
}

#[tokio::test]
async fn bare_subscription_id_failures_ask_for_redelivery() {
    let provider = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/subscriptions/sub_1"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&provider)
        .await;

    let harness = TestHarness::builder()
        .with_webhook_secret(SECRET)
        .build()
        .await
        .unwrap();
    let checkout = bare_checkout_envelope("alice", "sub_1", 1_700_000_000);

    let unconfigured = app(&harness);
    let (status, _) = send(&unconfigured, signed_webhook(&checkout, SECRET)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let client = ProviderClient::new(
        "sk_test_e2e",
        &format!("{}/v1", provider.uri()),
        std::time::Duration::from_secs(5),
    )
    .unwrap();
    let lookup: Arc<dyn SubscriptionLookup> = Arc::new(client);
    let failing = app_with_lookup(&harness, Some(lookup));
    let (status, _) = send(&failing, signed_webhook(&checkout, SECRET)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (_, sub) = send_json(&failing, get("/api/subscription", "alice")).await;
    assert_eq!(sub["subscription"], Value::Null);
}
