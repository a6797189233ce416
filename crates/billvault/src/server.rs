// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP server built on axum.
//!
//! Sets up routes, body limits, request tracing and shared state.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use billvault_billing::{Reconciler, SignatureVerifier, SubscriptionLookup};
use billvault_config::model::ServerConfig;
use billvault_core::{BillvaultError, SubscriptionStore};
use billvault_vault::{VaultEngine, VaultQueryService};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;

/// Room for the JSON envelope around a base64 payload.
const ENVELOPE_BYTES: usize = 64 * 1024;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub vault: VaultEngine,
    pub query: VaultQueryService,
    pub reconciler: Reconciler,
    /// Also checked by the health route.
    pub subscriptions: Arc<dyn SubscriptionStore>,
    /// `None` when no webhook secret is configured; every webhook is rejected.
    pub verifier: Option<Arc<SignatureVerifier>>,
    /// Resolves checkouts that name their subscription by id only. `None`
    /// when no provider API key is configured.
    pub lookup: Option<Arc<dyn SubscriptionLookup>>,
}

/// Request body ceiling for uploads of up to `max_payload_bytes`.
///
/// Payloads arrive base64 encoded, which inflates them by a third.
pub fn body_limit(max_payload_bytes: u64) -> usize {
    let encoded = max_payload_bytes.div_ceil(3).saturating_mul(4);
    usize::try_from(encoded)
        .unwrap_or(usize::MAX)
        .saturating_add(ENVELOPE_BYTES)
}

/// Build the application router.
///
/// `/health` and `/api/webhook` are unauthenticated (the webhook carries its
/// own signature); every other route requires the caller header.
pub fn router(state: AppState, body_limit: usize) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/api/webhook", post(handlers::post_webhook));

    let api_routes = Router::new()
        .route(
            "/api/vault",
            get(handlers::search_items).post(handlers::create_item),
        )
        .route("/api/vault/tags", get(handlers::list_tags))
        .route("/api/vault-policy", post(handlers::save_policy))
        .route("/api/vault/bulk-delete", post(handlers::bulk_delete))
        .route("/api/vault/bulk-tags", post(handlers::bulk_tags))
        .route("/api/vault/archive", post(handlers::download_archive))
        .route("/api/vault/{id}/tags", put(handlers::update_tags))
        .route("/api/vault/{id}/download", get(handlers::download_payload))
        .route("/api/subscription", get(handlers::get_subscription));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to the configured address and serve until `shutdown` resolves.
pub async fn start_server<F>(
    config: &ServerConfig,
    app: Router,
    shutdown: F,
) -> Result<(), BillvaultError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BillvaultError::Internal(format!("failed to bind {addr}: {e}")))?;

    tracing::info!("server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| BillvaultError::Internal(format!("server error: {e}")))?;

    Ok(())
}
