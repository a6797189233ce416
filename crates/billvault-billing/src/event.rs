// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider-neutral billing events and their validation.

use billvault_core::types::{BillingPeriod, CheckoutSnapshot, SubscriptionChange};
use billvault_core::{BillvaultError, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BillingEventKind {
    CheckoutCompleted,
    PaymentFailed,
    SubscriptionUpdated,
    SubscriptionDeleted,
}

/// A billing event as received, before validation.
///
/// Periods and `occurred_at` are epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingEvent {
    pub kind: BillingEventKind,
    /// Provider event id, carried for logging only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default)]
    pub subscription_ref: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub customer_ref: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub period_start: Option<i64>,
    #[serde(default)]
    pub period_end: Option<i64>,
    pub occurred_at: i64,
}

/// A billing event that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedEvent {
    Checkout(CheckoutSnapshot),
    Change {
        kind: BillingEventKind,
        change: SubscriptionChange,
    },
}

impl BillingEvent {
    /// Check required fields and convert timestamps.
    pub fn validate(&self) -> Result<ValidatedEvent, BillvaultError> {
        let subscription_ref = required(&self.subscription_ref, "subscription_ref")?;
        let status = required(&self.status, "status")?;
        let start = epoch(
            self.period_start
                .ok_or_else(|| missing("period_start"))?,
            "period_start",
        )?;
        let end = epoch(
            self.period_end.ok_or_else(|| missing("period_end"))?,
            "period_end",
        )?;
        if end < start {
            return Err(BillvaultError::Validation(format!(
                "period_end {end} is before period_start {start}"
            )));
        }
        let period = BillingPeriod { start, end };
        let occurred_at = epoch(self.occurred_at, "occurred_at")?;

        match self.kind {
            BillingEventKind::CheckoutCompleted => {
                let user_id = self
                    .user_id
                    .as_ref()
                    .filter(|u| !u.as_str().trim().is_empty())
                    .ok_or_else(|| missing("user_id"))?;
                Ok(ValidatedEvent::Checkout(CheckoutSnapshot {
                    user_id: user_id.clone(),
                    customer_ref: required(&self.customer_ref, "customer_ref")?,
                    subscription_ref,
                    status,
                    period,
                    occurred_at,
                }))
            }
            kind => Ok(ValidatedEvent::Change {
                kind,
                change: SubscriptionChange {
                    subscription_ref,
                    status,
                    period,
                    occurred_at,
                },
            }),
        }
    }
}

fn missing(field: &str) -> BillvaultError {
    BillvaultError::Validation(format!("billing event is missing `{field}`"))
}

fn required(value: &Option<String>, field: &str) -> Result<String, BillvaultError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| missing(field))
}

fn epoch(secs: i64, field: &str) -> Result<DateTime<Utc>, BillvaultError> {
    if secs < 0 {
        return Err(BillvaultError::Validation(format!(
            "`{field}` must not be negative"
        )));
    }
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        BillvaultError::Validation(format!("`{field}` {secs} is out of range"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(status: Option<&str>) -> BillingEvent {
        BillingEvent {
            kind: BillingEventKind::SubscriptionUpdated,
            event_id: None,
            subscription_ref: Some("sub_1".into()),
            user_id: None,
            customer_ref: None,
            status: status.map(str::to_string),
            period_start: Some(100),
            period_end: Some(200),
            occurred_at: 150,
        }
    }

    #[test]
    fn kind_names_are_snake_case() {
        assert_eq!(BillingEventKind::CheckoutCompleted.to_string(), "checkout_completed");
        let kind: BillingEventKind = "subscription_deleted".parse().unwrap();
        assert_eq!(kind, BillingEventKind::SubscriptionDeleted);
    }

    #[test]
    fn change_event_validates() {
        let ValidatedEvent::Change { kind, change } = update(Some(" active ")).validate().unwrap()
        else {
            panic!("expected a change");
        };
        assert_eq!(kind, BillingEventKind::SubscriptionUpdated);
        assert_eq!(change.status, "active");
        assert_eq!(change.occurred_at.timestamp(), 150);
    }

    #[test]
    fn empty_status_is_rejected() {
        assert!(matches!(
            update(Some("  ")).validate(),
            Err(BillvaultError::Validation(_))
        ));
        assert!(update(None).validate().is_err());
    }

    #[test]
    fn inverted_period_is_rejected() {
        let mut event = update(Some("active"));
        event.period_end = Some(50);
        let err = event.validate().unwrap_err();
        assert!(err.to_string().contains("before"));
    }

    #[test]
    fn checkout_requires_user_and_customer() {
        let mut event = update(Some("active"));
        event.kind = BillingEventKind::CheckoutCompleted;
        assert!(event.validate().unwrap_err().to_string().contains("user_id"));

        event.user_id = Some(UserId::from("u1"));
        assert!(event.validate().unwrap_err().to_string().contains("customer_ref"));

        event.customer_ref = Some("cus_1".into());
        assert!(matches!(event.validate().unwrap(), ValidatedEvent::Checkout(_)));
    }

    #[test]
    fn negative_timestamp_is_rejected() {
        let mut event = update(Some("active"));
        event.occurred_at = -1;
        assert!(event.validate().is_err());
    }

    #[test]
    fn deserializes_from_json() {
        let event: BillingEvent = serde_json::from_str(
            r#"{"kind":"payment_failed","subscription_ref":"sub_9","status":"past_due",
                "period_start":1,"period_end":2,"occurred_at":3}"#,
        )
        .unwrap();
        assert_eq!(event.kind, BillingEventKind::PaymentFailed);
        assert!(event.user_id.is_none());
    }
}
