// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Billvault service.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Billvault configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BillvaultConfig {
    /// HTTP listener and logging settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Document vault settings (index, payloads, upload limits).
    #[serde(default)]
    pub vault: VaultConfig,

    /// Subscription database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Payment provider webhook settings.
    #[serde(default)]
    pub billing: BillingConfig,
}

/// HTTP listener and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// TCP port of the HTTP server.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Document vault configuration.
///
/// The vault keeps one index document plus one file per payload under
/// `data_dir`. Every index mutation runs inside a single exclusive section
/// whose acquisition is bounded by `lock_timeout_ms`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Directory holding `index.json` and the `payloads/` directory.
    #[serde(default = "default_vault_dir")]
    pub data_dir: String,

    /// Maximum time a mutation waits for the exclusive section, in milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Upload size ceiling in bytes (default: 10 MiB).
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: u64,

    /// MIME types accepted for uploaded payloads.
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: default_vault_dir(),
            lock_timeout_ms: default_lock_timeout_ms(),
            max_payload_bytes: default_max_payload_bytes(),
            allowed_content_types: default_allowed_content_types(),
        }
    }
}

fn default_vault_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("billvault").join("vault"))
        .unwrap_or_else(|| std::path::PathBuf::from("vault"))
        .to_string_lossy()
        .into_owned()
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_max_payload_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_content_types() -> Vec<String> {
    ["application/pdf", "image/jpeg", "image/png", "image/gif"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Subscription database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("billvault").join("billvault.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("billvault.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Payment provider webhook configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BillingConfig {
    /// Shared secret for webhook signatures. `None` rejects every webhook.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Maximum accepted age of a signed webhook timestamp, in seconds.
    #[serde(default = "default_signature_tolerance_secs")]
    pub signature_tolerance_secs: u64,

    /// Provider API key used to look up subscriptions that a checkout names
    /// only by id. `None` leaves such checkouts unresolved.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the provider's REST API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Timeout for one provider API request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            signature_tolerance_secs: default_signature_tolerance_secs(),
            api_key: None,
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_signature_tolerance_secs() -> u64 {
    300
}

fn default_api_base() -> String {
    "https://api.stripe.com/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}
