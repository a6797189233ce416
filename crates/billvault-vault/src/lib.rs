// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document vault for the Billvault state core.
//!
//! A vault is one index document (`index.json`) plus one payload file per
//! uploaded artifact. The [`VaultEngine`] owns the index: every mutation
//! enters a single exclusive section, rereads the index from disk, applies
//! the change to an in-memory [`Snapshot`], and atomically replaces the file.
//! Reads never take the section and always observe a whole snapshot.

pub mod archive;
pub mod engine;
pub mod index;
pub mod item;
pub mod payload;
pub mod query;

pub use engine::{PayloadHandle, VaultEngine};
pub use index::Snapshot;
pub use item::{ItemType, NewItem, NewPayload, UploadLimits, VaultItem};
pub use payload::FsPayloadStore;
pub use query::{VaultQuery, VaultQueryService};
