// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caller identity extraction.
//!
//! Authentication happens in front of this service; the authenticating proxy
//! forwards the user id in the `x-user-id` header. Requests without it are
//! rejected (fail-closed).

use axum::{extract::FromRequestParts, http::StatusCode, http::request::Parts};
use billvault_core::UserId;

/// Header carrying the authenticated user id.
pub const USER_HEADER: &str = "x-user-id";

/// The authenticated caller of a vault or subscription route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub UserId);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match user {
            Some(user) => Ok(Caller(UserId::from(user))),
            None => {
                tracing::debug!(path = %parts.uri.path(), "request without caller identity rejected");
                Err(StatusCode::UNAUTHORIZED)
            }
        }
    }
}
