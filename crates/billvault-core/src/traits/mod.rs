// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for Billvault storage backends.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod payload;
pub mod subscription;

pub use adapter::PluginAdapter;
pub use payload::PayloadStore;
pub use subscription::SubscriptionStore;
