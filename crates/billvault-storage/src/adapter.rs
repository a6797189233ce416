// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the SubscriptionStore trait.

use async_trait::async_trait;
use tracing::debug;

use billvault_config::model::StorageConfig;
use billvault_core::types::{
    ChangeOutcome, CheckoutSnapshot, SubscriptionChange, SubscriptionRecord, UpsertOutcome,
    UserId,
};
use billvault_core::{
    AdapterType, BillvaultError, HealthStatus, PluginAdapter, SubscriptionStore,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed subscription record store.
///
/// Wraps a [`Database`] handle and delegates to the typed query module.
/// Every write goes through the database's single writer thread.
pub struct SqliteSubscriptionStore {
    db: Database,
}

impl SqliteSubscriptionStore {
    /// Wrap an already opened database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open the database described by `config` and wrap it.
    pub async fn open(config: &StorageConfig) -> Result<Self, BillvaultError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "subscription store initialized");
        Ok(Self::new(db))
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl PluginAdapter for SqliteSubscriptionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::SubscriptionStore
    }

    async fn health_check(&self) -> Result<HealthStatus, BillvaultError> {
        let ping = self
            .db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await;
        Ok(match ping {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), BillvaultError> {
        self.db.checkpoint().await
    }
}

#[async_trait]
impl SubscriptionStore for SqliteSubscriptionStore {
    async fn upsert_checkout(
        &self,
        checkout: &CheckoutSnapshot,
    ) -> Result<UpsertOutcome, BillvaultError> {
        queries::subscriptions::upsert_checkout(&self.db, checkout).await
    }

    async fn apply_change(
        &self,
        change: &SubscriptionChange,
    ) -> Result<ChangeOutcome, BillvaultError> {
        queries::subscriptions::apply_change(&self.db, change).await
    }

    async fn get_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<SubscriptionRecord>, BillvaultError> {
        queries::subscriptions::get_by_user(&self.db, user_id).await
    }

    async fn get_by_subscription_ref(
        &self,
        subscription_ref: &str,
    ) -> Result<Option<SubscriptionRecord>, BillvaultError> {
        queries::subscriptions::get_by_subscription_ref(&self.db, subscription_ref).await
    }
}
