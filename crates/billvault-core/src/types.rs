// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across adapter traits and the Billvault crates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of an end user. Every vault operation is scoped by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a vault item, assigned at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Key of a stored payload inside a [`PayloadStore`](crate::PayloadStore).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadRef(pub String);

impl PayloadRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of storage adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    PayloadStore,
    SubscriptionStore,
}

// --- Subscription types ---

/// Start and end of a billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The local mirror of one user's subscription at the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Local record identifier (UUID v4).
    pub id: String,
    /// Owning user; at most one record per user.
    pub user_id: UserId,
    /// Customer identifier at the payment provider.
    pub customer_ref: String,
    /// Subscription identifier at the payment provider.
    pub subscription_ref: String,
    /// Provider-defined status (`active`, `past_due`, `canceled`, ...).
    pub status: String,
    pub current_period: BillingPeriod,
    /// Timestamp of the last applied event. Used for ordering.
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// State carried by a completed checkout. Applied as an upsert by user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSnapshot {
    pub user_id: UserId,
    pub customer_ref: String,
    pub subscription_ref: String,
    pub status: String,
    pub period: BillingPeriod,
    pub occurred_at: DateTime<Utc>,
}

/// A status/period change for an already tracked subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChange {
    pub subscription_ref: String,
    pub status: String,
    pub period: BillingPeriod,
    pub occurred_at: DateTime<Utc>,
}

/// Result of upserting a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No record existed for the user.
    Created,
    /// The user's existing record was overwritten.
    Replaced,
    /// The record already tracks this subscription with a newer event.
    Stale { recorded_at: DateTime<Utc> },
}

/// Result of a conditional change application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The change was written (including equal-timestamp re-delivery).
    Applied,
    /// The record already reflects a newer event; nothing was written.
    Stale { recorded_at: DateTime<Utc> },
    /// No record carries this subscription reference.
    Untracked,
}
