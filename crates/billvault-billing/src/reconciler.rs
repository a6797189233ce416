// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Applies billing events to the subscription record store.

use std::sync::Arc;

use billvault_core::types::{ChangeOutcome, SubscriptionRecord, UpsertOutcome};
use billvault_core::{BillvaultError, SubscriptionStore, UserId};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::event::{BillingEvent, ValidatedEvent};

/// What applying one event did to the local record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Checkout created the user's first record.
    Created,
    /// Checkout overwrote the user's existing record.
    Replaced,
    /// A change event was written.
    Applied,
    /// The event was older than the record and was dropped.
    Stale { recorded_at: DateTime<Utc> },
    /// No record tracks the event's subscription; nothing was written.
    Untracked,
}

impl ApplyOutcome {
    /// Whether the record was written.
    pub fn changed_state(&self) -> bool {
        matches!(self, Self::Created | Self::Replaced | Self::Applied)
    }
}

/// Single entry point for billing events.
///
/// Ordering and idempotence come from the store: checkouts upsert by user
/// unless the record already holds a newer event for the same subscription,
/// everything else applies only when at least as new as the stored record.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn SubscriptionStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Validate and apply `event`.
    ///
    /// Malformed events fail with [`BillvaultError::Validation`] and change
    /// nothing. Events for untracked subscriptions are accepted no-ops.
    pub async fn apply(&self, event: &BillingEvent) -> Result<ApplyOutcome, BillvaultError> {
        let validated = event.validate().inspect_err(|e| {
            warn!(
                event_kind = %event.kind,
                event_id = event.event_id.as_deref().unwrap_or("-"),
                error = %e,
                "rejected malformed billing event"
            );
        })?;

        match validated {
            ValidatedEvent::Checkout(checkout) => {
                let outcome = match self.store.upsert_checkout(&checkout).await? {
                    UpsertOutcome::Created => ApplyOutcome::Created,
                    UpsertOutcome::Replaced => ApplyOutcome::Replaced,
                    UpsertOutcome::Stale { recorded_at } => {
                        warn!(
                            event_kind = %event.kind,
                            subscription_ref = %checkout.subscription_ref,
                            occurred_at = %checkout.occurred_at,
                            %recorded_at,
                            "dropped stale checkout"
                        );
                        return Ok(ApplyOutcome::Stale { recorded_at });
                    }
                };
                info!(
                    event_kind = %event.kind,
                    user_id = %checkout.user_id,
                    subscription_ref = %checkout.subscription_ref,
                    status = %checkout.status,
                    ?outcome,
                    "checkout recorded"
                );
                Ok(outcome)
            }
            ValidatedEvent::Change { kind, change } => {
                let outcome = match self.store.apply_change(&change).await? {
                    ChangeOutcome::Applied => {
                        info!(
                            event_kind = %kind,
                            subscription_ref = %change.subscription_ref,
                            status = %change.status,
                            "subscription updated"
                        );
                        ApplyOutcome::Applied
                    }
                    ChangeOutcome::Stale { recorded_at } => {
                        warn!(
                            event_kind = %kind,
                            subscription_ref = %change.subscription_ref,
                            occurred_at = %change.occurred_at,
                            %recorded_at,
                            "dropped stale billing event"
                        );
                        ApplyOutcome::Stale { recorded_at }
                    }
                    ChangeOutcome::Untracked => {
                        warn!(
                            event_kind = %kind,
                            subscription_ref = %change.subscription_ref,
                            "billing event for untracked subscription ignored"
                        );
                        ApplyOutcome::Untracked
                    }
                };
                Ok(outcome)
            }
        }
    }

    /// The subscription record of `user_id`, if any.
    pub async fn subscription_for(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, BillvaultError> {
        self.store.get_by_user(user_id).await
    }
}
