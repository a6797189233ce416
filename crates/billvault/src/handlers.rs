// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the vault, subscription and webhook routes.

use std::collections::{BTreeMap, BTreeSet};

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use billvault_billing::signature::SIGNATURE_HEADER;
use billvault_billing::{ApplyOutcome, resolve_checkout, translate_webhook};
use billvault_core::types::SubscriptionRecord;
use billvault_core::{BillvaultError, HealthStatus, ItemId};
use billvault_vault::{ItemType, NewItem, NewPayload, VaultItem, VaultQuery};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::auth::Caller;
use crate::server::AppState;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// A [`BillvaultError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub BillvaultError);

impl From<BillvaultError> for ApiError {
    fn from(e: BillvaultError) -> Self {
        Self(e)
    }
}

impl ApiError {
    /// Retryable failures map to 503 so webhook senders redeliver.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BillvaultError::Validation(_) | BillvaultError::Signature(_) => StatusCode::BAD_REQUEST,
            BillvaultError::NotFound { .. } => StatusCode::NOT_FOUND,
            BillvaultError::Forbidden { .. } => StatusCode::FORBIDDEN,
            BillvaultError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            BillvaultError::Storage { .. } => "storage unavailable, retry later".to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            error!(error = %self.0, %status, "request failed");
        } else {
            debug!(error = %self.0, %status, "request rejected");
        }

        let body = Json(ErrorResponse { error: message });
        if matches!(self.0, BillvaultError::Busy { .. }) {
            (status, [(header::RETRY_AFTER, "1")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

// --- Health ---

/// Response body for GET /health.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok`, `degraded` or `unhealthy`.
    pub status: String,
    pub version: String,
    pub vault: String,
    pub subscriptions: String,
}

fn describe(status: &HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

/// GET /health
///
/// Unauthenticated. Returns 503 when either store is unhealthy.
pub async fn get_health(State(state): State<AppState>) -> Response {
    let vault = state.vault.health().await;
    let subscriptions = match state.subscriptions.health_check().await {
        Ok(status) => status,
        Err(e) => HealthStatus::Unhealthy(e.to_string()),
    };

    let statuses = [&vault, &subscriptions];
    let (code, label) = if statuses
        .iter()
        .any(|s| matches!(s, HealthStatus::Unhealthy(_)))
    {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    } else if statuses
        .iter()
        .any(|s| matches!(s, HealthStatus::Degraded(_)))
    {
        (StatusCode::OK, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        code,
        Json(HealthResponse {
            status: label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            vault: describe(&vault),
            subscriptions: describe(&subscriptions),
        }),
    )
        .into_response()
}

// --- Vault ---

/// Query string of GET /api/vault.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    /// Comma separated; an item must carry every listed tag.
    pub tags: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
}

/// GET /api/vault
pub async fn search_items(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<VaultItem>>> {
    let query = VaultQuery::parse(
        params.q.as_deref(),
        params.tags.as_deref(),
        params.item_type.as_deref(),
    )?;
    Ok(Json(state.query.search(&owner, &query).await?))
}

/// Response body for GET /api/vault/tags.
#[derive(Debug, Serialize, Deserialize)]
pub struct TagsResponse {
    pub tags: BTreeSet<String>,
}

/// GET /api/vault/tags
pub async fn list_tags(
    State(state): State<AppState>,
    Caller(owner): Caller,
) -> ApiResult<Json<TagsResponse>> {
    let tags = state.query.available_tags(&owner).await?;
    Ok(Json(TagsResponse { tags }))
}

/// Uploaded file inside a create request. `data` is standard base64.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadUpload {
    pub filename: String,
    pub content_type: String,
    pub data: String,
}

/// Request body for POST /api/vault.
#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub payload: Option<PayloadUpload>,
}

/// POST /api/vault
pub async fn create_item(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Json(body): Json<CreateItemRequest>,
) -> ApiResult<(StatusCode, Json<VaultItem>)> {
    let mut new = NewItem::new(owner, ItemType::parse(&body.item_type)?).with_tags(body.tags);
    if let Some(content) = body.content {
        new = new.with_content(content);
    }
    for (key, value) in body.metadata {
        new = new.with_metadata(key, value);
    }
    if let Some(upload) = body.payload {
        let bytes = BASE64
            .decode(upload.data.as_bytes())
            .map_err(|e| BillvaultError::Validation(format!("payload data is not base64: {e}")))?;
        new = new.with_payload(NewPayload {
            filename: upload.filename,
            content_type: upload.content_type,
            bytes,
        });
    }

    let item = state.vault.create_item(new).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Request body for POST /api/vault-policy: parsed fields plus the raw text.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRequest {
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub raw_text: String,
}

/// POST /api/vault-policy
///
/// Non-string metadata values are stored as their JSON text.
pub async fn save_policy(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Json(body): Json<PolicyRequest>,
) -> ApiResult<(StatusCode, Json<VaultItem>)> {
    let mut new = NewItem::new(owner, ItemType::Policy).with_content(body.raw_text);
    for (key, value) in body.metadata {
        let value = match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        new = new.with_metadata(key, value);
    }
    let item = state.vault.create_item(new).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Request body carrying a tag list.
#[derive(Debug, Deserialize)]
pub struct TagsRequest {
    pub tags: Vec<String>,
}

/// PUT /api/vault/{id}/tags
pub async fn update_tags(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Path(id): Path<String>,
    Json(body): Json<TagsRequest>,
) -> ApiResult<Json<VaultItem>> {
    let item = state
        .vault
        .update_tags(&ItemId::from(id.as_str()), &owner, body.tags)
        .await?;
    Ok(Json(item))
}

/// Request body naming a set of items.
#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<String>,
}

fn item_ids(ids: &[String]) -> Vec<ItemId> {
    ids.iter().map(|id| ItemId::from(id.as_str())).collect()
}

/// Response body for POST /api/vault/bulk-delete.
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkDeleteResponse {
    pub deleted: usize,
}

/// POST /api/vault/bulk-delete
pub async fn bulk_delete(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Json(body): Json<IdsRequest>,
) -> ApiResult<Json<BulkDeleteResponse>> {
    let deleted = state
        .vault
        .delete_items(&item_ids(&body.ids), &owner)
        .await?;
    Ok(Json(BulkDeleteResponse { deleted }))
}

/// Request body for POST /api/vault/bulk-tags.
#[derive(Debug, Deserialize)]
pub struct BulkTagsRequest {
    pub ids: Vec<String>,
    pub tags: Vec<String>,
}

/// Response body for POST /api/vault/bulk-tags.
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkTagsResponse {
    pub updated: usize,
}

/// POST /api/vault/bulk-tags
pub async fn bulk_tags(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Json(body): Json<BulkTagsRequest>,
) -> ApiResult<Json<BulkTagsResponse>> {
    let updated = state
        .vault
        .add_tags(&item_ids(&body.ids), &owner, body.tags)
        .await?;
    Ok(Json(BulkTagsResponse { updated }))
}

/// Quoted-string safe `Content-Disposition` value.
fn attachment(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

/// Served when the item recorded no content type.
const OCTET_STREAM: &str = "application/octet-stream";

/// GET /api/vault/{id}/download
pub async fn download_payload(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let handle = state
        .vault
        .get_payload(&ItemId::from(id.as_str()), &owner)
        .await?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                handle
                    .content_type
                    .clone()
                    .unwrap_or_else(|| OCTET_STREAM.to_string()),
            ),
            (header::CONTENT_DISPOSITION, attachment(&handle.filename)),
        ],
        handle.bytes,
    )
        .into_response())
}

/// POST /api/vault/archive
pub async fn download_archive(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Json(body): Json<IdsRequest>,
) -> ApiResult<Response> {
    let archive = state.vault.archive(&item_ids(&body.ids), &owner).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/gzip".to_string()),
            (header::CONTENT_DISPOSITION, attachment("vault.tar.gz")),
        ],
        archive,
    )
        .into_response())
}

// --- Subscription ---

/// Response body for GET /api/subscription.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub subscription: Option<SubscriptionRecord>,
}

/// GET /api/subscription
pub async fn get_subscription(
    State(state): State<AppState>,
    Caller(user): Caller,
) -> ApiResult<Json<SubscriptionResponse>> {
    let subscription = state.reconciler.subscription_for(&user).await?;
    Ok(Json(SubscriptionResponse { subscription }))
}

/// Response body for POST /api/webhook.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    /// What the event did: `created`, `replaced`, `applied`, `stale`,
    /// `untracked` or `ignored`.
    pub outcome: String,
}

fn outcome_label(outcome: &ApplyOutcome) -> &'static str {
    match outcome {
        ApplyOutcome::Created => "created",
        ApplyOutcome::Replaced => "replaced",
        ApplyOutcome::Applied => "applied",
        ApplyOutcome::Stale { .. } => "stale",
        ApplyOutcome::Untracked => "untracked",
    }
}

/// POST /api/webhook
///
/// Verifies the provider signature over the raw body before parsing it.
/// No-op outcomes are acknowledged with 200 so the provider stops
/// redelivering them.
pub async fn post_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let verifier = state
        .verifier
        .as_ref()
        .ok_or_else(|| BillvaultError::Signature("webhook secret is not configured".into()))?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| BillvaultError::Signature(format!("missing {SIGNATURE_HEADER} header")))?;
    verifier
        .verify(signature, &body, chrono::Utc::now().timestamp())
        .inspect_err(|e| warn!(error = %e, "webhook signature rejected"))?;

    let Some(event) = translate_webhook(&body)? else {
        return Ok(Json(WebhookAck {
            received: true,
            outcome: "ignored".to_string(),
        }));
    };

    let event = resolve_checkout(event, state.lookup.as_deref())
        .await
        .inspect_err(|e| warn!(error = %e, "checkout subscription lookup failed"))?;
    let outcome = state.reconciler.apply(&event).await?;
    info!(
        event_kind = %event.kind,
        event_id = event.event_id.as_deref().unwrap_or("-"),
        outcome = outcome_label(&outcome),
        "webhook processed"
    );
    Ok(Json(WebhookAck {
        received: true,
        outcome: outcome_label(&outcome).to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn error_statuses() {
        let cases = [
            (BillvaultError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (BillvaultError::Signature("x".into()), StatusCode::BAD_REQUEST),
            (
                BillvaultError::NotFound {
                    kind: "item",
                    id: "a".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                BillvaultError::Forbidden {
                    kind: "item",
                    id: "a".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                BillvaultError::Busy {
                    waited: Duration::from_millis(5),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (BillvaultError::storage("disk full"), StatusCode::SERVICE_UNAVAILABLE),
            (BillvaultError::Internal("join".into()), StatusCode::SERVICE_UNAVAILABLE),
            (
                BillvaultError::Provider {
                    message: "timeout".into(),
                    source: None,
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (BillvaultError::Config("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, expected) in cases {
            assert_eq!(ApiError(error).status(), expected);
        }
    }

    #[test]
    fn busy_response_carries_retry_after() {
        let response = ApiError(BillvaultError::Busy {
            waited: Duration::from_millis(5),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }

    #[test]
    fn attachment_header_is_quoted_safely() {
        assert_eq!(attachment("bill.pdf"), "attachment; filename=\"bill.pdf\"");
        assert_eq!(
            attachment("a\"b\\c\u{e9}.pdf"),
            "attachment; filename=\"a_b_c_.pdf\""
        );
    }
}
