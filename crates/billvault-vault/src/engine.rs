// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault index engine: item CRUD under a single exclusive section.
//!
//! Every mutation follows the same protocol: enter the section (bounded by
//! the configured lock timeout), reload the index from disk, mutate the
//! snapshot, atomically replace the index, leave the section. The section
//! body runs on its own task, so a caller that stops waiting does not cut a
//! write short, and a panic inside it still releases the section.

use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use billvault_config::model::VaultConfig;
use billvault_core::{BillvaultError, HealthStatus, ItemId, PayloadRef, PayloadStore, UserId};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, warn};

use crate::archive::{build_archive, ArchiveEntry};
use crate::index::{IndexFile, Snapshot};
use crate::item::{normalize_tags, NewItem, UploadLimits, VaultItem};
use crate::payload::FsPayloadStore;

/// Subdirectory of the vault data dir holding payload files.
pub const PAYLOAD_DIR: &str = "payloads";

/// Bytes and presentation details of one stored payload.
#[derive(Debug, Clone)]
pub struct PayloadHandle {
    pub item_id: ItemId,
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Result of [`VaultEngine::recover`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub temp_files_removed: usize,
    /// Payloads that no index entry references.
    pub orphaned_payloads: Vec<PayloadRef>,
    /// Whether the orphaned payloads were deleted.
    pub pruned: bool,
}

struct Inner {
    index: IndexFile,
    payloads: Arc<dyn PayloadStore>,
    section: Arc<Mutex<()>>,
    lock_timeout: Duration,
    limits: UploadLimits,
}

/// Owner of the vault index. Cheap to clone; clones share the exclusive section.
#[derive(Clone)]
pub struct VaultEngine {
    inner: Arc<Inner>,
}

impl VaultEngine {
    /// Open the vault under `config.data_dir` with the given payload store.
    pub async fn open(
        config: &VaultConfig,
        payloads: Arc<dyn PayloadStore>,
    ) -> Result<Self, BillvaultError> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(BillvaultError::storage)?;
        let index = IndexFile::new(&config.data_dir);
        let swept = index.sweep_temp_files().await?;
        // Fail fast on an unreadable index rather than on the first request.
        let snapshot = index.load().await?;
        info!(
            data_dir = %config.data_dir,
            items = snapshot.len(),
            swept,
            payload_store = payloads.name(),
            "vault opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                index,
                payloads,
                section: Arc::new(Mutex::new(())),
                lock_timeout: Duration::from_millis(config.lock_timeout_ms),
                limits: UploadLimits::from_config(config),
            }),
        })
    }

    /// Open the vault with a filesystem payload store in `data_dir/payloads`.
    pub async fn open_fs(config: &VaultConfig) -> Result<Self, BillvaultError> {
        let store = FsPayloadStore::open(Path::new(&config.data_dir).join(PAYLOAD_DIR)).await?;
        Self::open(config, Arc::new(store)).await
    }

    pub fn payloads(&self) -> &Arc<dyn PayloadStore> {
        &self.inner.payloads
    }

    pub fn index_path(&self) -> &Path {
        self.inner.index.path()
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.inner.limits
    }

    /// Run `body` inside the exclusive section.
    async fn exclusive<T, F, Fut>(&self, op: &'static str, body: F) -> Result<T, BillvaultError>
    where
        F: FnOnce(Arc<Inner>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, BillvaultError>> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        let waited = self.inner.lock_timeout;
        let guard = tokio::time::timeout(waited, Arc::clone(&self.inner.section).lock_owned())
            .await
            .map_err(|_| {
                warn!(op, waited_ms = waited.as_millis() as u64, "vault exclusive section busy");
                BillvaultError::Busy { waited }
            })?;
        debug!(
            op,
            wait_ms = started.elapsed().as_millis() as u64,
            "entered exclusive section"
        );

        let inner = Arc::clone(&self.inner);
        // Body logs stay inside the caller's span.
        tokio::spawn(
            async move {
                let _guard = guard;
                body(inner).await
            }
            .instrument(tracing::Span::current()),
        )
        .await
        .map_err(|e| BillvaultError::Internal(format!("vault {op} did not complete: {e}")))?
    }

    /// Create an item, writing its payload (if any) before the index entry.
    pub async fn create_item(&self, new: NewItem) -> Result<VaultItem, BillvaultError> {
        let tags = normalize_tags(&new.tags)?;
        let id = ItemId(uuid::Uuid::new_v4().to_string());

        let mut item = VaultItem {
            id: id.clone(),
            owner_id: new.owner_id,
            item_type: new.item_type,
            content: new.content,
            metadata: new.metadata,
            tags,
            filename: None,
            payload_ref: None,
            content_type: None,
            size_bytes: None,
            created_at: Utc::now(),
        };

        let bytes = match new.payload {
            Some(payload) => {
                let (filename, content_type) = self.inner.limits.check(&payload)?;
                item.filename = Some(filename);
                item.content_type = Some(content_type);
                item.size_bytes = Some(payload.bytes.len() as u64);
                item.payload_ref = Some(PayloadRef(id.0.clone()));
                Some(payload.bytes)
            }
            None => None,
        };

        self.exclusive("create", move |inner| async move {
            if let (Some(key), Some(bytes)) = (&item.payload_ref, bytes) {
                inner.payloads.put(key, bytes).await?;
            }

            let committed = async {
                let mut snapshot = inner.index.load().await?;
                snapshot.insert(item.clone())?;
                inner.index.store(&snapshot).await
            }
            .await;

            if let Err(e) = committed {
                if let Some(key) = &item.payload_ref
                    && let Err(cleanup) = inner.payloads.delete(key).await
                {
                    warn!(
                        item_id = %item.id,
                        payload_ref = %key,
                        error = %cleanup,
                        "could not remove payload of uncommitted item"
                    );
                }
                return Err(e);
            }

            info!(
                item_id = %item.id,
                owner_id = %item.owner_id,
                item_type = %item.item_type,
                has_payload = item.payload_ref.is_some(),
                "vault item created"
            );
            Ok(item)
        })
        .await
    }

    /// Replace the tag set of an item owned by `owner`.
    pub async fn update_tags<I, S>(
        &self,
        id: &ItemId,
        owner: &UserId,
        tags: I,
    ) -> Result<VaultItem, BillvaultError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = normalize_tags(tags)?;
        let id = id.clone();
        let owner = owner.clone();

        self.exclusive("update_tags", move |inner| async move {
            let mut snapshot = inner.index.load().await?;
            let item = snapshot
                .get_mut(&id)
                .filter(|item| item.is_owned_by(&owner))
                .ok_or_else(|| item_not_found(&id))?;
            if item.tags == tags {
                return Ok(item.clone());
            }
            item.tags = tags;
            let updated = item.clone();
            inner.index.store(&snapshot).await?;
            debug!(item_id = %id, owner_id = %owner, "tags replaced");
            Ok(updated)
        })
        .await
    }

    /// Merge `tags` into every listed item owned by `owner`.
    ///
    /// Unknown and foreign ids are skipped. Returns how many items matched.
    pub async fn add_tags<I, S>(
        &self,
        ids: &[ItemId],
        owner: &UserId,
        tags: I,
    ) -> Result<usize, BillvaultError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = normalize_tags(tags)?;
        let ids: Vec<ItemId> = dedup_ids(ids);
        let owner = owner.clone();

        self.exclusive("add_tags", move |inner| async move {
            let mut snapshot = inner.index.load().await?;
            let mut matched = 0;
            let mut changed = false;
            for id in &ids {
                if let Some(item) = snapshot.get_mut(id).filter(|i| i.is_owned_by(&owner)) {
                    matched += 1;
                    let before = item.tags.len();
                    item.tags.extend(tags.iter().cloned());
                    changed |= item.tags.len() != before;
                }
            }
            if changed {
                inner.index.store(&snapshot).await?;
            }
            debug!(owner_id = %owner, matched, "tags merged");
            Ok(matched)
        })
        .await
    }

    /// Delete the listed items owned by `owner` together with their payloads.
    ///
    /// Unknown and foreign ids are skipped and not counted. The index entry
    /// goes first; a payload that then fails to delete is logged and left as
    /// an orphan for [`recover`](Self::recover).
    pub async fn delete_items(
        &self,
        ids: &[ItemId],
        owner: &UserId,
    ) -> Result<usize, BillvaultError> {
        let wanted: HashSet<ItemId> = ids.iter().cloned().collect();
        let owner = owner.clone();

        self.exclusive("delete", move |inner| async move {
            let mut snapshot = inner.index.load().await?;
            let removed =
                snapshot.remove_where(|item| wanted.contains(&item.id) && item.is_owned_by(&owner));
            if removed.is_empty() {
                return Ok(0);
            }
            inner.index.store(&snapshot).await?;

            for item in &removed {
                let Some(key) = &item.payload_ref else {
                    continue;
                };
                if let Err(e) = inner.payloads.delete(key).await {
                    warn!(
                        item_id = %item.id,
                        payload_ref = %key,
                        error = %e,
                        "payload delete failed, leaving orphan payload"
                    );
                }
            }

            info!(owner_id = %owner, count = removed.len(), "vault items deleted");
            Ok(removed.len())
        })
        .await
    }

    /// The current index, read without entering the exclusive section.
    pub async fn snapshot(&self) -> Result<Snapshot, BillvaultError> {
        self.inner.index.load().await
    }

    /// Items owned by `owner`, in insertion order.
    pub async fn list_items(&self, owner: &UserId) -> Result<Vec<VaultItem>, BillvaultError> {
        Ok(self
            .snapshot()
            .await?
            .into_items()
            .into_iter()
            .filter(|item| item.is_owned_by(owner))
            .collect())
    }

    /// Look up one item, distinguishing absent from not owned.
    pub async fn get_item(&self, id: &ItemId, owner: &UserId) -> Result<VaultItem, BillvaultError> {
        let snapshot = self.snapshot().await?;
        let item = snapshot.get(id).ok_or_else(|| item_not_found(id))?;
        if !item.is_owned_by(owner) {
            return Err(BillvaultError::Forbidden {
                kind: "vault item",
                id: id.to_string(),
            });
        }
        Ok(item.clone())
    }

    /// Fetch the payload of an item owned by `owner`.
    pub async fn get_payload(
        &self,
        id: &ItemId,
        owner: &UserId,
    ) -> Result<PayloadHandle, BillvaultError> {
        let item = self.get_item(id, owner).await?;
        let (Some(key), Some(filename)) = (item.payload_ref, item.filename) else {
            return Err(BillvaultError::NotFound {
                kind: "payload",
                id: id.to_string(),
            });
        };
        let bytes = self.inner.payloads.get(&key).await?;
        Ok(PayloadHandle {
            item_id: item.id,
            filename,
            content_type: item.content_type,
            bytes,
        })
    }

    /// Build a `.tar.gz` holding the payload of every listed item owned by `owner`.
    ///
    /// Ids that are unknown, foreign, or have no payload are skipped. An
    /// item deleted between the index read and the payload read is skipped
    /// as well.
    pub async fn archive(&self, ids: &[ItemId], owner: &UserId) -> Result<Vec<u8>, BillvaultError> {
        let snapshot = self.snapshot().await?;
        let mut entries = Vec::new();
        for id in dedup_ids(ids) {
            let Some(item) = snapshot.get(&id).filter(|i| i.is_owned_by(owner)) else {
                continue;
            };
            let (Some(key), Some(filename)) = (&item.payload_ref, &item.filename) else {
                continue;
            };
            match self.inner.payloads.get(key).await {
                Ok(bytes) => entries.push(ArchiveEntry {
                    filename: filename.clone(),
                    bytes,
                }),
                Err(BillvaultError::NotFound { .. }) => {
                    debug!(item_id = %id, "payload vanished while archiving, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        if entries.is_empty() {
            return Err(BillvaultError::Validation(
                "none of the selected items has a downloadable payload".to_string(),
            ));
        }

        let count = entries.len();
        let archive = tokio::task::spawn_blocking(move || build_archive(&entries))
            .await
            .map_err(|e| BillvaultError::Internal(format!("archive task failed: {e}")))??;
        debug!(owner_id = %owner, count, bytes = archive.len(), "archive built");
        Ok(archive)
    }

    /// Remove leftover temp files and report (optionally delete) orphaned payloads.
    ///
    /// Runs inside the exclusive section, so no create can be mid-way between
    /// writing its payload and committing its index entry.
    pub async fn recover(&self, prune: bool) -> Result<RecoveryReport, BillvaultError> {
        self.exclusive("recover", move |inner| async move {
            let temp_files_removed = inner.index.sweep_temp_files().await?;
            let snapshot = inner.index.load().await?;
            let referenced: HashSet<&PayloadRef> = snapshot
                .items()
                .iter()
                .filter_map(|item| item.payload_ref.as_ref())
                .collect();

            let mut orphaned_payloads: Vec<PayloadRef> = inner
                .payloads
                .list()
                .await?
                .into_iter()
                .filter(|key| !referenced.contains(key))
                .collect();
            orphaned_payloads.sort();

            if prune {
                for key in &orphaned_payloads {
                    inner.payloads.delete(key).await?;
                }
            }
            if !orphaned_payloads.is_empty() {
                info!(count = orphaned_payloads.len(), pruned = prune, "orphaned payloads found");
            }

            Ok(RecoveryReport {
                temp_files_removed,
                orphaned_payloads,
                pruned: prune,
            })
        })
        .await
    }

    /// Index readability plus the payload store's own health.
    pub async fn health(&self) -> HealthStatus {
        if let Err(e) = self.snapshot().await {
            return HealthStatus::Unhealthy(format!("vault index unreadable: {e}"));
        }
        match self.inner.payloads.health_check().await {
            Ok(status) => status,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        }
    }
}

fn item_not_found(id: &ItemId) -> BillvaultError {
    BillvaultError::NotFound {
        kind: "vault item",
        id: id.to_string(),
    }
}

/// Drop repeated ids, keeping first-seen order.
fn dedup_ids(ids: &[ItemId]) -> Vec<ItemId> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect()
}
