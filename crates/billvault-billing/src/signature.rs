// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook signature verification.
//!
//! The provider sends `t=<unix seconds>,v1=<hex hmac>` where the MAC is
//! HMAC-SHA256 over `"{t}.{raw body}"` keyed with the shared secret. Several
//! `v1` entries may be present during secret rotation; any match is accepted.

use std::time::Duration;

use billvault_config::model::BillingConfig;
use billvault_core::BillvaultError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "billing-signature";

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    tolerance: Duration,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>, tolerance: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            tolerance,
        }
    }

    /// Build a verifier from config. `None` when no secret is configured.
    pub fn from_config(config: &BillingConfig) -> Option<Self> {
        config.webhook_secret.as_ref().map(|secret| {
            Self::new(
                secret.as_bytes(),
                Duration::from_secs(config.signature_tolerance_secs),
            )
        })
    }

    fn mac(&self, timestamp: i64, body: &[u8]) -> Result<HmacSha256, BillvaultError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| BillvaultError::Internal(format!("invalid webhook secret: {e}")))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }

    /// Produce a header value for `body` signed at `timestamp`.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> Result<String, BillvaultError> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("t={timestamp},v1={}", hex::encode(digest)))
    }

    /// Verify `header` against `body`, with `now` in epoch seconds.
    pub fn verify(&self, header: &str, body: &[u8], now: i64) -> Result<(), BillvaultError> {
        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        BillvaultError::Signature(format!("bad timestamp `{value}`"))
                    })?);
                }
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| BillvaultError::Signature("missing timestamp".into()))?;
        if candidates.is_empty() {
            return Err(BillvaultError::Signature("missing v1 signature".into()));
        }

        let age = now.abs_diff(timestamp);
        if age > self.tolerance.as_secs() {
            return Err(BillvaultError::Signature(format!(
                "timestamp is {age}s away from now, tolerance is {}s",
                self.tolerance.as_secs()
            )));
        }

        let mut matched = false;
        for candidate in candidates {
            let Ok(expected) = hex::decode(candidate) else {
                continue;
            };
            if self.mac(timestamp, body)?.verify_slice(&expected).is_ok() {
                matched = true;
                break;
            }
        }
        if matched {
            Ok(())
        } else {
            Err(BillvaultError::Signature("signature does not match".into()))
        }
    }
}
