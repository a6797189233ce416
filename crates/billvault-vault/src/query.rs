// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only search over an owner's vault items.

use std::collections::BTreeSet;

use billvault_core::{BillvaultError, UserId};

use crate::engine::VaultEngine;
use crate::item::{normalize_tags, ItemType, VaultItem};

/// Filters applied on top of owner scoping. An empty query matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultQuery {
    /// Case-insensitive substring of content, serialized metadata and the
    /// type name. Only the empty string disables the filter.
    pub text: Option<String>,
    /// Every listed tag must be present on the item.
    pub tags: BTreeSet<String>,
    pub item_type: Option<ItemType>,
}

impl VaultQuery {
    /// Build a query from raw request parameters (`tags` is comma separated).
    pub fn parse(
        text: Option<&str>,
        tags: Option<&str>,
        item_type: Option<&str>,
    ) -> Result<Self, BillvaultError> {
        // Surrounding whitespace is part of the needle.
        let text = text.filter(|t| !t.is_empty()).map(str::to_string);
        let tags = normalize_tags(tags.unwrap_or_default().split(','))?;
        let item_type = item_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ItemType::parse)
            .transpose()?;
        Ok(Self {
            text,
            tags,
            item_type,
        })
    }

    pub fn matches(&self, item: &VaultItem) -> bool {
        if self.item_type.is_some_and(|t| t != item.item_type) {
            return false;
        }
        if !self.tags.is_subset(&item.tags) {
            return false;
        }
        match &self.text {
            Some(text) => text_matches(item, &text.to_lowercase()),
            None => true,
        }
    }
}

/// The searched text is content, compact JSON metadata and the type name
/// joined without separators, so a needle may span two of them.
fn text_matches(item: &VaultItem, needle: &str) -> bool {
    let metadata = serde_json::to_string(&item.metadata).unwrap_or_default();
    let haystack = format!(
        "{}{}{}",
        item.content.as_deref().unwrap_or_default(),
        metadata,
        item.item_type
    );
    haystack.to_lowercase().contains(needle)
}

/// Query front end over a [`VaultEngine`]. Never enters the exclusive section.
#[derive(Clone)]
pub struct VaultQueryService {
    engine: VaultEngine,
}

impl VaultQueryService {
    pub fn new(engine: VaultEngine) -> Self {
        Self { engine }
    }

    /// Items owned by `owner` that match `query`, in creation order.
    pub async fn search(
        &self,
        owner: &UserId,
        query: &VaultQuery,
    ) -> Result<Vec<VaultItem>, BillvaultError> {
        Ok(self
            .engine
            .list_items(owner)
            .await?
            .into_iter()
            .filter(|item| query.matches(item))
            .collect())
    }

    /// Distinct tags across the owner's items, sorted.
    pub async fn available_tags(&self, owner: &UserId) -> Result<BTreeSet<String>, BillvaultError> {
        Ok(self
            .engine
            .list_items(owner)
            .await?
            .into_iter()
            .flat_map(|item| item.tags)
            .collect())
    }
}
