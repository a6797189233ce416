// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription lookups against the payment provider's REST API.
//!
//! Checkout sessions usually name their subscription by id only. Before such
//! a checkout can be recorded, [`resolve_checkout`] fetches the subscription's
//! status and billing period through a [`SubscriptionLookup`].

use std::time::Duration;

use async_trait::async_trait;
use billvault_config::model::BillingConfig;
use billvault_core::BillvaultError;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, info};

use crate::event::{BillingEvent, BillingEventKind};

/// The provider's view of one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// Fetches subscriptions from the payment provider.
#[async_trait]
pub trait SubscriptionLookup: Send + Sync {
    async fn fetch_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<ProviderSubscription, BillvaultError>;
}

/// HTTP client for the provider's subscription endpoint.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    base_url: String,
}

impl ProviderClient {
    /// Creates a client authenticating with `api_key` as a bearer token.
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, BillvaultError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| {
            BillvaultError::Config(format!("invalid billing.api_key header value: {e}"))
        })?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| BillvaultError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a client from config. `None` when no API key is configured.
    pub fn from_config(config: &BillingConfig) -> Result<Option<Self>, BillvaultError> {
        config
            .api_key
            .as_deref()
            .map(|key| {
                Self::new(
                    key,
                    &config.api_base,
                    Duration::from_secs(config.request_timeout_secs),
                )
            })
            .transpose()
    }
}

#[async_trait]
impl SubscriptionLookup for ProviderClient {
    async fn fetch_subscription(
        &self,
        subscription_ref: &str,
    ) -> Result<ProviderSubscription, BillvaultError> {
        if subscription_ref.is_empty()
            || !subscription_ref
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(BillvaultError::Validation(format!(
                "malformed subscription id '{subscription_ref}'"
            )));
        }

        let url = format!("{}/subscriptions/{subscription_ref}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BillvaultError::Provider {
                message: format!("subscription lookup failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(%status, subscription_ref, "subscription lookup response received");

        if status == StatusCode::NOT_FOUND {
            return Err(BillvaultError::Validation(format!(
                "provider does not know subscription {subscription_ref}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillvaultError::Provider {
                message: format!("subscription lookup returned {status}: {body}"),
                source: None,
            });
        }

        response
            .json::<ProviderSubscription>()
            .await
            .map_err(|e| BillvaultError::Provider {
                message: format!("unreadable subscription body: {e}"),
                source: Some(Box::new(e)),
            })
    }
}

/// Fill in the subscription details of a checkout that only carries the
/// subscription id. Every other event is returned unchanged.
///
/// A bare id without a configured lookup is a configuration error, so the
/// provider keeps redelivering until an API key is set.
pub async fn resolve_checkout(
    mut event: BillingEvent,
    lookup: Option<&dyn SubscriptionLookup>,
) -> Result<BillingEvent, BillvaultError> {
    let needs_lookup = event.kind == BillingEventKind::CheckoutCompleted
        && (event.status.is_none() || event.period_start.is_none() || event.period_end.is_none());
    let Some(subscription_ref) = event.subscription_ref.clone().filter(|_| needs_lookup) else {
        return Ok(event);
    };

    let lookup = lookup.ok_or_else(|| {
        BillvaultError::Config(format!(
            "billing.api_key is not set; cannot resolve subscription {subscription_ref}"
        ))
    })?;
    let subscription = lookup.fetch_subscription(&subscription_ref).await?;
    if subscription.id != subscription_ref {
        return Err(BillvaultError::Validation(format!(
            "lookup of subscription {subscription_ref} returned {}",
            subscription.id
        )));
    }

    info!(
        subscription_ref = %subscription_ref,
        status = %subscription.status,
        "resolved checkout subscription"
    );
    event.status = Some(subscription.status);
    event.period_start = subscription.current_period_start;
    event.period_end = subscription.current_period_end;
    if event.customer_ref.is_none() {
        event.customer_ref = subscription.customer;
    }
    Ok(event)
}
