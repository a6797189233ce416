// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid IP addresses, non-empty paths, and bounded upload sizes.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::BillvaultConfig;

/// Largest upload ceiling accepted in configuration (100 MiB).
const MAX_PAYLOAD_CEILING: u64 = 100 * 1024 * 1024;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &BillvaultConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let addr = config.server.bind_address.trim();
    if addr.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.bind_address must not be empty".to_string(),
        });
    } else {
        // Accept valid IPv4, IPv6, or hostname patterns
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!(
                    "server.bind_address `{addr}` is not a valid IP address or hostname"
                ),
            });
        }
    }

    if config.vault.data_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "vault.data_dir must not be empty".to_string(),
        });
    }

    if config.vault.lock_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            message: "vault.lock_timeout_ms must be greater than 0".to_string(),
        });
    }

    if config.vault.max_payload_bytes == 0 || config.vault.max_payload_bytes > MAX_PAYLOAD_CEILING
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "vault.max_payload_bytes must be between 1 and {MAX_PAYLOAD_CEILING}, got {}",
                config.vault.max_payload_bytes
            ),
        });
    }

    if config.vault.allowed_content_types.is_empty() {
        errors.push(ConfigError::Validation {
            message: "vault.allowed_content_types must list at least one MIME type".to_string(),
        });
    }

    let mut seen_types = HashSet::new();
    for content_type in &config.vault.allowed_content_types {
        let well_formed = content_type
            .split_once('/')
            .is_some_and(|(kind, subtype)| !kind.is_empty() && !subtype.is_empty());
        if !well_formed {
            errors.push(ConfigError::Validation {
                message: format!(
                    "vault.allowed_content_types entry `{content_type}` is not of the form type/subtype"
                ),
            });
        }
        if !seen_types.insert(content_type.to_ascii_lowercase()) {
            errors.push(ConfigError::Validation {
                message: format!(
                    "duplicate content type `{content_type}` in vault.allowed_content_types"
                ),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.billing.signature_tolerance_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "billing.signature_tolerance_secs must be greater than 0".to_string(),
        });
    }

    if let Some(secret) = &config.billing.webhook_secret
        && secret.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "billing.webhook_secret must not be blank when set".to_string(),
        });
    }

    if let Some(key) = &config.billing.api_key
        && key.trim().is_empty()
    {
        errors.push(ConfigError::Validation {
            message: "billing.api_key must not be blank when set".to_string(),
        });
    }

    let api_base = config.billing.api_base.trim();
    if !(api_base.starts_with("https://") || api_base.starts_with("http://")) {
        errors.push(ConfigError::Validation {
            message: format!("billing.api_base must be an http(s) URL, got '{api_base}'"),
        });
    }

    if config.billing.request_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "billing.request_timeout_secs must be greater than 0".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
