// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filesystem payload store: one file per payload reference.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use billvault_core::{
    AdapterType, BillvaultError, HealthStatus, PayloadRef, PayloadStore, PluginAdapter,
};
use tracing::debug;

use crate::index::{sweep_temp_files, write_atomic};

const TEMP_PREFIX: &str = ".payload.";

/// Stores payload bytes as files under a single directory.
///
/// Writes go through a temp file and a rename, so a payload file is either
/// absent or complete.
#[derive(Debug, Clone)]
pub struct FsPayloadStore {
    root: PathBuf,
}

impl FsPayloadStore {
    /// Open the store rooted at `root`, creating the directory and removing
    /// temp files left by interrupted writes.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, BillvaultError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(BillvaultError::storage)?;
        sweep_temp_files(&root, TEMP_PREFIX).await?;
        debug!(root = %root.display(), "payload store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &PayloadRef) -> Result<PathBuf, BillvaultError> {
        let name = key.as_str();
        let safe = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(BillvaultError::Validation(format!(
                "invalid payload reference `{name}`"
            )));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl PluginAdapter for FsPayloadStore {
    fn name(&self) -> &str {
        "fs-payloads"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::PayloadStore
    }

    async fn health_check(&self) -> Result<HealthStatus, BillvaultError> {
        Ok(match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => HealthStatus::Healthy,
            Ok(_) => HealthStatus::Unhealthy(format!("{} is not a directory", self.root.display())),
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), BillvaultError> {
        Ok(())
    }
}

#[async_trait]
impl PayloadStore for FsPayloadStore {
    async fn put(&self, key: &PayloadRef, bytes: Vec<u8>) -> Result<(), BillvaultError> {
        let path = self.path_for(key)?;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || write_atomic(&root, &path, TEMP_PREFIX, &bytes))
            .await
            .map_err(|e| BillvaultError::Internal(format!("payload write task failed: {e}")))??;
        debug!(payload_ref = %key, "payload stored");
        Ok(())
    }

    async fn get(&self, key: &PayloadRef) -> Result<Vec<u8>, BillvaultError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BillvaultError::NotFound {
                kind: "payload",
                id: key.to_string(),
            }),
            Err(e) => Err(BillvaultError::storage(e)),
        }
    }

    async fn delete(&self, key: &PayloadRef) -> Result<(), BillvaultError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(payload_ref = %key, "payload deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BillvaultError::storage(e)),
        }
    }

    async fn exists(&self, key: &PayloadRef) -> Result<bool, BillvaultError> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(BillvaultError::storage)
    }

    async fn list(&self) -> Result<Vec<PayloadRef>, BillvaultError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(BillvaultError::storage)?;
        let mut refs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(BillvaultError::storage)? {
            let is_file = entry
                .file_type()
                .await
                .map_err(BillvaultError::storage)?
                .is_file();
            let name = entry.file_name();
            if let Some(name) = name.to_str()
                && is_file
                && !name.starts_with('.')
            {
                refs.push(PayloadRef(name.to_string()));
            }
        }
        Ok(refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key(s: &str) -> PayloadRef {
        PayloadRef(s.to_string())
    }

    #[tokio::test]
    async fn put_get_delete() {
        let dir = tempdir().unwrap();
        let store = FsPayloadStore::open(dir.path().join("payloads")).await.unwrap();

        store.put(&key("abc"), b"%PDF-1.7".to_vec()).await.unwrap();
        assert!(store.exists(&key("abc")).await.unwrap());
        assert_eq!(store.get(&key("abc")).await.unwrap(), b"%PDF-1.7");

        store.delete(&key("abc")).await.unwrap();
        assert!(!store.exists(&key("abc")).await.unwrap());
        store.delete(&key("abc")).await.unwrap();
    }

    #[tokio::test]
    async fn missing_payload_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FsPayloadStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.get(&key("nope")).await,
            Err(BillvaultError::NotFound { kind: "payload", .. })
        ));
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let dir = tempdir().unwrap();
        let store = FsPayloadStore::open(dir.path()).await.unwrap();
        for bad in ["../escape", "a/b", "", ".hidden"] {
            assert!(matches!(
                store.put(&key(bad), vec![1]).await,
                Err(BillvaultError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn list_skips_temp_files() {
        let dir = tempdir().unwrap();
        let store = FsPayloadStore::open(dir.path()).await.unwrap();
        store.put(&key("one"), vec![1]).await.unwrap();
        std::fs::write(dir.path().join(".payload.x.tmp"), "partial").unwrap();

        let refs = store.list().await.unwrap();
        assert_eq!(refs, vec![key("one")]);
    }

    #[tokio::test]
    async fn open_sweeps_leftover_temp_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".payload.abc.tmp"), "partial").unwrap();
        let store = FsPayloadStore::open(dir.path()).await.unwrap();
        assert!(!dir.path().join(".payload.abc.tmp").exists());
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }
}
