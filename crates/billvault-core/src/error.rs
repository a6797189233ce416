// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Billvault state core.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across the vault engine, the subscription
/// reconciler, and their storage adapters.
#[derive(Debug, Error)]
pub enum BillvaultError {
    /// Malformed input: unknown item type, oversized payload, missing event fields.
    #[error("validation error: {0}")]
    Validation(String),

    /// The referenced entity does not exist in the caller's scope.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The referenced entity exists but belongs to someone else.
    #[error("access to {kind} {id} is forbidden")]
    Forbidden { kind: &'static str, id: String },

    /// Persistence failure (payload files, index document, database).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The exclusive section could not be entered within the configured bound.
    #[error("vault is busy: exclusive section not acquired after {waited:?}")]
    Busy { waited: Duration },

    /// Webhook signature header missing, malformed, expired, or not matching.
    #[error("signature rejected: {0}")]
    Signature(String),

    /// Payment provider API failure (network, non-success status, bad body).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors (invalid TOML, out-of-range values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillvaultError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Whether the sender of the failed request should try again later.
    ///
    /// Webhook boundaries use this to pick between a retryable (5xx) and a
    /// final (4xx) response to the payment provider.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Busy { .. } | Self::Provider { .. } | Self::Internal(_)
        )
    }
}
