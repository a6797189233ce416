// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscription reconciliation for Billvault.
//!
//! Payment provider webhooks arrive at least once and in any order. This
//! crate verifies their signatures, translates provider envelopes into
//! [`BillingEvent`]s, resolves checkouts that name their subscription by id
//! only, and applies them through the [`Reconciler`] so the
//! local record always reflects the newest event by timestamp.

pub mod event;
pub mod provider;
pub mod reconciler;
pub mod signature;
pub mod webhook;

pub use event::{BillingEvent, BillingEventKind, ValidatedEvent};
pub use provider::{ProviderClient, ProviderSubscription, SubscriptionLookup, resolve_checkout};
pub use reconciler::{ApplyOutcome, Reconciler};
pub use signature::SignatureVerifier;
pub use webhook::translate_webhook;
