// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payload store wrapper that fails on demand.
//!
//! `FlakyPayloadStore` delegates to a real store until a failure switch is
//! flipped, then returns storage errors for that operation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use billvault_core::{
    AdapterType, BillvaultError, HealthStatus, PayloadRef, PayloadStore, PluginAdapter,
};

pub struct FlakyPayloadStore {
    inner: Arc<dyn PayloadStore>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    puts: AtomicUsize,
    deletes: AtomicUsize,
}

impl FlakyPayloadStore {
    pub fn new(inner: Arc<dyn PayloadStore>) -> Self {
        Self {
            inner,
            fail_puts: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            puts: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent `put` fail (or succeed again).
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `delete` fail (or succeed again).
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of `put` calls that reached the wrapped store.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls that reached the wrapped store.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn injected(op: &str) -> BillvaultError {
        BillvaultError::storage(format!("injected {op} failure"))
    }
}

#[async_trait]
impl PluginAdapter for FlakyPayloadStore {
    fn name(&self) -> &str {
        "flaky"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PayloadStore
    }

    async fn health_check(&self) -> Result<HealthStatus, BillvaultError> {
        if self.fail_puts.load(Ordering::SeqCst) || self.fail_deletes.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Degraded("failure injection active".into()));
        }
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), BillvaultError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl PayloadStore for FlakyPayloadStore {
    async fn put(&self, key: &PayloadRef, bytes: Vec<u8>) -> Result<(), BillvaultError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Self::injected("put"));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, bytes).await
    }

    async fn get(&self, key: &PayloadRef) -> Result<Vec<u8>, BillvaultError> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &PayloadRef) -> Result<(), BillvaultError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected("delete"));
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &PayloadRef) -> Result<bool, BillvaultError> {
        self.inner.exists(key).await
    }

    async fn list(&self) -> Result<Vec<PayloadRef>, BillvaultError> {
        self.inner.list().await
    }
}
