// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The durable index document and its in-memory snapshot.
//!
//! The index is persisted as one JSON document that is replaced atomically:
//! the new content goes to a temp file in the same directory, is synced, and
//! is renamed over `index.json`. A reader therefore sees either the previous
//! or the next document, never a partial one.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use billvault_core::{BillvaultError, ItemId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::item::VaultItem;

pub const INDEX_FILE: &str = "index.json";
pub const INDEX_FORMAT_VERSION: u32 = 1;

const TEMP_PREFIX: &str = ".index.json.";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Serialize)]
struct IndexDocumentRef<'a> {
    version: u32,
    items: &'a [VaultItem],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IndexDocument {
    Versioned { version: u32, items: Vec<VaultItem> },
    /// Bare array written by earlier deployments.
    Legacy(Vec<VaultItem>),
}

/// All vault items in insertion order, addressable by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    items: Vec<VaultItem>,
    positions: HashMap<ItemId, usize>,
}

impl Snapshot {
    /// Build a snapshot, rejecting duplicate ids.
    pub fn from_items(items: Vec<VaultItem>) -> Result<Self, BillvaultError> {
        let mut positions = HashMap::with_capacity(items.len());
        for (pos, item) in items.iter().enumerate() {
            if positions.insert(item.id.clone(), pos).is_some() {
                return Err(BillvaultError::storage(format!(
                    "index contains duplicate item id {}",
                    item.id
                )));
            }
        }
        Ok(Self { items, positions })
    }

    pub fn items(&self) -> &[VaultItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &ItemId) -> Option<&VaultItem> {
        self.positions.get(id).map(|&pos| &self.items[pos])
    }

    pub fn get_mut(&mut self, id: &ItemId) -> Option<&mut VaultItem> {
        self.positions.get(id).map(|&pos| &mut self.items[pos])
    }

    /// Append `item`. Fails if its id is already present.
    pub fn insert(&mut self, item: VaultItem) -> Result<(), BillvaultError> {
        if self.positions.contains_key(&item.id) {
            return Err(BillvaultError::Internal(format!(
                "item id {} already present in index",
                item.id
            )));
        }
        self.positions.insert(item.id.clone(), self.items.len());
        self.items.push(item);
        Ok(())
    }

    /// Remove every item matching `pred`, keeping the order of the rest.
    pub fn remove_where<F>(&mut self, mut pred: F) -> Vec<VaultItem>
    where
        F: FnMut(&VaultItem) -> bool,
    {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.items).into_iter().partition(|item| pred(item));
        self.items = kept;
        self.positions = self
            .items
            .iter()
            .enumerate()
            .map(|(pos, item)| (item.id.clone(), pos))
            .collect();
        removed
    }

    pub fn into_items(self) -> Vec<VaultItem> {
        self.items
    }
}

/// Location of the index document on disk.
#[derive(Debug, Clone)]
pub struct IndexFile {
    dir: PathBuf,
    path: PathBuf,
}

impl IndexFile {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let path = dir.join(INDEX_FILE);
        Self { dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document. A missing or blank file is an empty index.
    pub async fn load(&self) -> Result<Snapshot, BillvaultError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(e) => return Err(BillvaultError::storage(e)),
        };
        parse_document(&raw)
    }

    /// Atomically replace the document with `snapshot`.
    ///
    /// On failure the previous document is left untouched.
    pub async fn store(&self, snapshot: &Snapshot) -> Result<(), BillvaultError> {
        let body = serde_json::to_vec_pretty(&IndexDocumentRef {
            version: INDEX_FORMAT_VERSION,
            items: snapshot.items(),
        })
        .map_err(BillvaultError::storage)?;

        let dir = self.dir.clone();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, TEMP_PREFIX, &body))
            .await
            .map_err(|e| BillvaultError::Internal(format!("index write task failed: {e}")))??;
        debug!(items = snapshot.len(), "index persisted");
        Ok(())
    }

    /// Remove temp files left behind by interrupted writes. Returns how many were removed.
    pub async fn sweep_temp_files(&self) -> Result<usize, BillvaultError> {
        sweep_temp_files(&self.dir, TEMP_PREFIX).await
    }
}

fn parse_document(raw: &[u8]) -> Result<Snapshot, BillvaultError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(Snapshot::default());
    }
    let items = match serde_json::from_slice(raw).map_err(BillvaultError::storage)? {
        IndexDocument::Versioned { version, items } if version == INDEX_FORMAT_VERSION => items,
        IndexDocument::Versioned { version, .. } => {
            return Err(BillvaultError::storage(format!(
                "unsupported index format version {version}"
            )));
        }
        IndexDocument::Legacy(items) => items,
    };
    Snapshot::from_items(items)
}

/// Write `body` to a temp file in `dir`, sync it, and rename it over `path`.
pub(crate) fn write_atomic(
    dir: &Path,
    path: &Path,
    prefix: &str,
    body: &[u8],
) -> Result<(), BillvaultError> {
    let mut tmp = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(BillvaultError::storage)?;
    tmp.write_all(body).map_err(BillvaultError::storage)?;
    tmp.as_file().sync_all().map_err(BillvaultError::storage)?;
    tmp.persist(path).map_err(|e| BillvaultError::storage(e.error))?;
    Ok(())
}

/// Delete files in `dir` named `{prefix}*.tmp`.
pub(crate) async fn sweep_temp_files(dir: &Path, prefix: &str) -> Result<usize, BillvaultError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(BillvaultError::storage(e)),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await.map_err(BillvaultError::storage)? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !(name.starts_with(prefix) && name.ends_with(TEMP_SUFFIX)) {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                warn!(file = name, "removed leftover temp file");
                removed += 1;
            }
            Err(e) => warn!(file = name, error = %e, "could not remove leftover temp file"),
        }
    }
    Ok(removed)
}
