// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Billvault state core.
//!
//! This crate provides the error type, the shared identifier and subscription
//! types, and the storage adapter traits implemented by the payload store and
//! the subscription database.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::BillvaultError;
pub use types::{AdapterType, HealthStatus, ItemId, PayloadRef, UserId};

pub use traits::{PayloadStore, PluginAdapter, SubscriptionStore};
