// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payload store trait for document bytes kept outside the vault index.

use async_trait::async_trait;

use crate::error::BillvaultError;
use crate::traits::adapter::PluginAdapter;
use crate::types::PayloadRef;

/// Adapter for storing the binary artifacts behind vault items.
///
/// Payloads are addressed by [`PayloadRef`]. A payload must never become
/// visible half-written: `put` either stores all bytes or leaves no trace
/// under the reference.
#[async_trait]
pub trait PayloadStore: PluginAdapter {
    /// Stores `bytes` under `key`, replacing any previous payload.
    async fn put(&self, key: &PayloadRef, bytes: Vec<u8>) -> Result<(), BillvaultError>;

    /// Reads the payload stored under `key`.
    ///
    /// Returns [`BillvaultError::NotFound`] when nothing is stored there.
    async fn get(&self, key: &PayloadRef) -> Result<Vec<u8>, BillvaultError>;

    /// Deletes the payload under `key`. Deleting a missing payload is not an error.
    async fn delete(&self, key: &PayloadRef) -> Result<(), BillvaultError>;

    /// Whether a payload is stored under `key`.
    async fn exists(&self, key: &PayloadRef) -> Result<bool, BillvaultError>;

    /// Lists every stored payload reference, in no particular order.
    async fn list(&self) -> Result<Vec<PayloadRef>, BillvaultError>;
}
