// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `billvault serve` command implementation.
//!
//! Opens the vault engine and the subscription store, then serves the HTTP
//! routes until SIGINT or SIGTERM.

use std::sync::Arc;

use billvault::server::{self, AppState};
use billvault_billing::{ProviderClient, Reconciler, SignatureVerifier, SubscriptionLookup};
use billvault_config::model::BillvaultConfig;
use billvault_core::{BillvaultError, SubscriptionStore};
use billvault_storage::SqliteSubscriptionStore;
use billvault_vault::{VaultEngine, VaultQueryService};
use tracing::{info, warn};

/// Runs the `billvault serve` command.
pub async fn run_serve(config: BillvaultConfig) -> Result<(), BillvaultError> {
    info!("starting billvault serve");

    let vault = VaultEngine::open_fs(&config.vault).await?;
    let query = VaultQueryService::new(vault.clone());

    let subscriptions: Arc<dyn SubscriptionStore> =
        Arc::new(SqliteSubscriptionStore::open(&config.storage).await?);
    let reconciler = Reconciler::new(subscriptions.clone());

    let verifier = SignatureVerifier::from_config(&config.billing).map(Arc::new);
    if verifier.is_none() {
        warn!("billing.webhook_secret is not set; webhooks will be rejected");
    }

    let lookup = ProviderClient::from_config(&config.billing)?
        .map(|client| Arc::new(client) as Arc<dyn SubscriptionLookup>);
    if lookup.is_none() {
        warn!("billing.api_key is not set; checkouts naming a bare subscription id will fail");
    }

    let state = AppState {
        vault,
        query,
        reconciler,
        subscriptions: subscriptions.clone(),
        verifier,
        lookup,
    };
    let app = server::router(state, server::body_limit(config.vault.max_payload_bytes));

    let result = server::start_server(&config.server, app, shutdown_signal()).await;

    if let Err(e) = subscriptions.shutdown().await {
        warn!(error = %e, "subscription store shutdown failed");
    }
    info!("billvault stopped");
    result
}

/// Resolves on SIGINT (Ctrl+C) or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
        _ = terminate => info!("received SIGTERM, initiating shutdown"),
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `log_level`.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "billvault={log_level},billvault_vault={log_level},billvault_billing={log_level},\
             billvault_storage={log_level},tower_http={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
