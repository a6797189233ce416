// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for integration testing.
//!
//! `TestHarness` assembles the vault engine (over a [`FlakyPayloadStore`]
//! wrapping the filesystem store), the query service, and the SQLite
//! subscription store with its reconciler, all inside one temp directory
//! that is removed on drop.

use std::path::Path;
use std::sync::Arc;

use billvault_billing::Reconciler;
use billvault_config::model::{BillvaultConfig, StorageConfig, VaultConfig};
use billvault_core::BillvaultError;
use billvault_storage::SqliteSubscriptionStore;
use billvault_vault::engine::PAYLOAD_DIR;
use billvault_vault::{FsPayloadStore, NewPayload, VaultEngine, VaultQueryService};

use crate::flaky_store::FlakyPayloadStore;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    lock_timeout_ms: Option<u64>,
    max_payload_bytes: Option<u64>,
    webhook_secret: Option<String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            lock_timeout_ms: None,
            max_payload_bytes: None,
            webhook_secret: None,
        }
    }

    /// Bound on waiting for the vault's exclusive section.
    pub fn with_lock_timeout_ms(mut self, ms: u64) -> Self {
        self.lock_timeout_ms = Some(ms);
        self
    }

    /// Upload size ceiling.
    pub fn with_max_payload_bytes(mut self, bytes: u64) -> Self {
        self.max_payload_bytes = Some(bytes);
        self
    }

    /// Webhook secret placed in the harness config.
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Build the harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, BillvaultError> {
        let temp_dir = tempfile::TempDir::new().map_err(BillvaultError::storage)?;

        let defaults = VaultConfig::default();
        let vault_config = VaultConfig {
            data_dir: temp_dir.path().join("vault").to_string_lossy().into_owned(),
            lock_timeout_ms: self.lock_timeout_ms.unwrap_or(defaults.lock_timeout_ms),
            max_payload_bytes: self.max_payload_bytes.unwrap_or(defaults.max_payload_bytes),
            allowed_content_types: defaults.allowed_content_types,
        };
        let storage_config = StorageConfig {
            database_path: temp_dir.path().join("test.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };

        let fs_store =
            FsPayloadStore::open(Path::new(&vault_config.data_dir).join(PAYLOAD_DIR)).await?;
        let payloads = Arc::new(FlakyPayloadStore::new(Arc::new(fs_store)));
        let vault = VaultEngine::open(&vault_config, payloads.clone()).await?;
        let query = VaultQueryService::new(vault.clone());

        let subscriptions = Arc::new(SqliteSubscriptionStore::open(&storage_config).await?);
        let reconciler = Reconciler::new(subscriptions.clone());

        let mut config = BillvaultConfig {
            vault: vault_config,
            storage: storage_config,
            ..BillvaultConfig::default()
        };
        config.billing.webhook_secret = self.webhook_secret;

        Ok(TestHarness {
            config,
            vault,
            query,
            payloads,
            subscriptions,
            reconciler,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment backed by a temp directory.
pub struct TestHarness {
    /// Configuration pointing at the temp directory.
    pub config: BillvaultConfig,
    pub vault: VaultEngine,
    pub query: VaultQueryService,
    /// The payload store under the vault, with failure switches.
    pub payloads: Arc<FlakyPayloadStore>,
    pub subscriptions: Arc<SqliteSubscriptionStore>,
    pub reconciler: Reconciler,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Root of the harness temp directory.
    pub fn root(&self) -> &Path {
        self._temp_dir.path()
    }

    /// A small PDF payload named `filename`.
    pub fn pdf(filename: &str) -> NewPayload {
        NewPayload {
            filename: filename.to_string(),
            content_type: "application/pdf".to_string(),
            bytes: format!("%PDF-1.7 {filename}").into_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billvault_core::{PayloadStore, UserId};
    use billvault_vault::{ItemType, NewItem};

    #[tokio::test]
    async fn harness_builds_and_round_trips_an_item() {
        let harness = TestHarness::builder().build().await.unwrap();
        let item = harness
            .vault
            .create_item(
                NewItem::new(UserId::from("u1"), ItemType::Bill)
                    .with_payload(TestHarness::pdf("bill.pdf")),
            )
            .await
            .unwrap();
        assert_eq!(harness.payloads.put_count(), 1);
        assert!(harness
            .payloads
            .exists(item.payload_ref.as_ref().unwrap())
            .await
            .unwrap());
        assert!(harness.root().join("vault/index.json").exists());
    }

    #[tokio::test]
    async fn builder_options_reach_config() {
        let harness = TestHarness::builder()
            .with_lock_timeout_ms(50)
            .with_max_payload_bytes(4)
            .with_webhook_secret("whsec_x")
            .build()
            .await
            .unwrap();
        assert_eq!(harness.config.vault.lock_timeout_ms, 50);
        assert_eq!(harness.vault.limits().max_bytes, 4);
        assert_eq!(harness.config.billing.webhook_secret.as_deref(), Some("whsec_x"));
    }
}
