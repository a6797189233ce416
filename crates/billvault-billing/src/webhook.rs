// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translation of payment provider webhook envelopes into [`BillingEvent`]s.
//!
//! Envelopes look like `{"id", "type", "created", "data": {"object": {...}}}`.
//! Event types this service does not track translate to `None` and are
//! acknowledged without further processing. A checkout that names its
//! subscription by id only translates without status or period; those are
//! filled in by [`crate::provider::resolve_checkout`].

use billvault_core::{BillvaultError, UserId};
use serde::Deserialize;
use serde_json::Value;

use crate::event::{BillingEvent, BillingEventKind};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: Value,
}

/// Parse a raw webhook body. `Ok(None)` means the event type is not tracked.
pub fn translate_webhook(body: &[u8]) -> Result<Option<BillingEvent>, BillvaultError> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| BillvaultError::Validation(format!("malformed webhook body: {e}")))?;
    let object = &envelope.data.object;

    let event = match envelope.event_type.as_str() {
        "checkout.session.completed" => {
            // Either an expanded subscription object or its bare id.
            let subscription = object.get("subscription");
            let user_id = str_field(object, &["metadata", "userId"])
                .or_else(|| str_field(object, &["client_reference_id"]))
                .map(UserId::from);
            BillingEvent {
                kind: BillingEventKind::CheckoutCompleted,
                event_id: envelope.id,
                subscription_ref: subscription
                    .and_then(|s| s.as_str().or_else(|| str_field(s, &["id"])))
                    .map(str::to_string),
                user_id,
                customer_ref: str_field(object, &["customer"])
                    .or_else(|| subscription.and_then(|s| str_field(s, &["customer"])))
                    .map(str::to_string),
                status: subscription
                    .and_then(|s| str_field(s, &["status"]))
                    .map(str::to_string),
                period_start: subscription.and_then(|s| int_field(s, "current_period_start")),
                period_end: subscription.and_then(|s| int_field(s, "current_period_end")),
                occurred_at: envelope.created,
            }
        }
        "customer.subscription.updated" | "customer.subscription.deleted" => {
            let kind = if envelope.event_type.ends_with("deleted") {
                BillingEventKind::SubscriptionDeleted
            } else {
                BillingEventKind::SubscriptionUpdated
            };
            BillingEvent {
                kind,
                event_id: envelope.id,
                subscription_ref: str_field(object, &["id"]).map(str::to_string),
                user_id: None,
                customer_ref: str_field(object, &["customer"]).map(str::to_string),
                status: str_field(object, &["status"]).map(str::to_string),
                period_start: int_field(object, "current_period_start"),
                period_end: int_field(object, "current_period_end"),
                occurred_at: envelope.created,
            }
        }
        "invoice.payment_failed" => BillingEvent {
            kind: BillingEventKind::PaymentFailed,
            event_id: envelope.id,
            // The subscription the invoice bills, not the invoice's own id.
            subscription_ref: str_field(object, &["subscription"]).map(str::to_string),
            user_id: None,
            customer_ref: str_field(object, &["customer"]).map(str::to_string),
            status: Some(
                str_field(object, &["subscription_status"])
                    .unwrap_or("past_due")
                    .to_string(),
            ),
            period_start: int_field(object, "period_start"),
            period_end: int_field(object, "period_end"),
            occurred_at: envelope.created,
        },
        other => {
            tracing::debug!(event_type = other, "ignoring untracked webhook event type");
            return Ok(None);
        }
    };
    Ok(Some(event))
}

fn str_field<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
}

fn int_field(value: &Value, key: &str) -> Option<i64> {
    value.get(key).and_then(Value::as_i64)
}
