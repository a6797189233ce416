// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./billvault.toml` > `~/.config/billvault/billvault.toml` > `/etc/billvault/billvault.toml`
//! with environment variable overrides via `BILLVAULT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::BillvaultConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/billvault/billvault.toml` (system-wide)
/// 3. `~/.config/billvault/billvault.toml` (user XDG config)
/// 4. `./billvault.toml` (local directory)
/// 5. `BILLVAULT_*` environment variables
pub fn load_config() -> Result<BillvaultConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<BillvaultConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BillvaultConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BillvaultConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BillvaultConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(BillvaultConfig::default()))
        .merge(Toml::file("/etc/billvault/billvault.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("billvault/billvault.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("billvault.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `BILLVAULT_VAULT_LOCK_TIMEOUT_MS` must map to
/// `vault.lock_timeout_ms`, not `vault.lock.timeout.ms`.
fn env_provider() -> Env {
    Env::prefixed("BILLVAULT_").map(|key| {
        // `key` keeps the env var's case with the prefix stripped.
        // Example: BILLVAULT_BILLING_WEBHOOK_SECRET -> "billing_webhook_secret"
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("vault_", "vault.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("billing_", "billing.", 1);
        mapped.into()
    })
}
