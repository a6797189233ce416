// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription store trait for the local mirror of provider subscriptions.

use async_trait::async_trait;

use crate::error::BillvaultError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChangeOutcome, CheckoutSnapshot, SubscriptionChange, SubscriptionRecord, UpsertOutcome,
    UserId,
};

/// Adapter owning at most one [`SubscriptionRecord`] per user.
///
/// Both write operations must be atomic with respect to each other: the
/// timestamp comparison in [`apply_change`](Self::apply_change) and the write
/// it guards happen as one step.
#[async_trait]
pub trait SubscriptionStore: PluginAdapter {
    /// Creates the user's record or overwrites refs, status and period on it.
    async fn upsert_checkout(
        &self,
        checkout: &CheckoutSnapshot,
    ) -> Result<UpsertOutcome, BillvaultError>;

    /// Applies `change` to the record with the same subscription reference,
    /// unless that record was last updated by a strictly newer event.
    async fn apply_change(
        &self,
        change: &SubscriptionChange,
    ) -> Result<ChangeOutcome, BillvaultError>;

    /// Looks up the record owned by `user_id`.
    async fn get_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, BillvaultError>;

    /// Looks up the record tracking the provider subscription `subscription_ref`.
    async fn get_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<SubscriptionRecord>, BillvaultError>;
}
