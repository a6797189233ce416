// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault item model and upload validation.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use billvault_config::model::VaultConfig;
use billvault_core::{BillvaultError, ItemId, PayloadRef, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Longest tag accepted, in characters.
pub const MAX_TAG_LEN: usize = 64;

/// Kind of document held by a vault item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemType {
    /// Generated dispute or appeal letter.
    Letter,
    /// Parsed insurance policy.
    Policy,
    /// Uploaded medical bill.
    Bill,
}

impl ItemType {
    /// Parse a caller-supplied type name, case-insensitively.
    pub fn parse(raw: &str) -> Result<Self, BillvaultError> {
        Self::from_str(&raw.trim().to_ascii_lowercase()).map_err(|_| {
            BillvaultError::Validation(format!(
                "unknown item type `{raw}` (expected letter, policy or bill)"
            ))
        })
    }
}

/// One record in the vault index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultItem {
    pub id: ItemId,
    pub owner_id: UserId,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Original filename of the uploaded artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_ref: Option<PayloadRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl VaultItem {
    pub fn is_owned_by(&self, owner: &UserId) -> bool {
        &self.owner_id == owner
    }
}

/// Request to create a vault item.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub owner_id: UserId,
    pub item_type: ItemType,
    pub content: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub payload: Option<NewPayload>,
}

impl NewItem {
    /// An item of `item_type` with no content, metadata, tags or payload.
    pub fn new(owner_id: UserId, item_type: ItemType) -> Self {
        Self {
            owner_id,
            item_type,
            content: None,
            metadata: BTreeMap::new(),
            tags: Vec::new(),
            payload: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_payload(mut self, payload: NewPayload) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// File artifact uploaded with a new item.
#[derive(Clone)]
pub struct NewPayload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for NewPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewPayload")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Size and content-type constraints applied to uploads.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::from_config(&VaultConfig::default())
    }
}

impl UploadLimits {
    pub fn from_config(config: &VaultConfig) -> Self {
        Self {
            max_bytes: config.max_payload_bytes,
            allowed_content_types: config
                .allowed_content_types
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Validate `payload` and return its sanitized filename and normalized content type.
    pub fn check(&self, payload: &NewPayload) -> Result<(String, String), BillvaultError> {
        let filename = sanitize_filename(&payload.filename)?;

        if payload.bytes.is_empty() {
            return Err(BillvaultError::Validation(format!(
                "payload `{filename}` is empty"
            )));
        }
        let size = payload.bytes.len() as u64;
        if size > self.max_bytes {
            return Err(BillvaultError::Validation(format!(
                "payload `{filename}` is {size} bytes, limit is {}",
                self.max_bytes
            )));
        }

        let content_type = normalize_content_type(&payload.content_type);
        if !self.allowed_content_types.contains(&content_type) {
            return Err(BillvaultError::Validation(format!(
                "content type `{}` is not accepted (allowed: {})",
                payload.content_type,
                self.allowed_content_types.join(", ")
            )));
        }

        Ok((filename, content_type))
    }
}

/// `application/PDF; charset=binary` -> `application/pdf`.
fn normalize_content_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Reduce a client-supplied filename to its final path component.
pub fn sanitize_filename(raw: &str) -> Result<String, BillvaultError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." || name.chars().any(char::is_control) {
        return Err(BillvaultError::Validation(format!(
            "invalid filename `{raw}`"
        )));
    }
    Ok(name.to_string())
}

/// Trim tags, drop blanks, and collapse duplicates.
pub fn normalize_tags<I, S>(tags: I) -> Result<BTreeSet<String>, BillvaultError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized = BTreeSet::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(BillvaultError::Validation(format!(
                "tag `{tag}` is longer than {MAX_TAG_LEN} characters"
            )));
        }
        normalized.insert(tag.to_string());
    }
    Ok(normalized)
}
