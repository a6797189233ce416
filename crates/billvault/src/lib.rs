// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP boundary of the Billvault service.
//!
//! Exposes the vault engine, the query service and the subscription
//! reconciler as an axum router. The `billvault` binary wires the router to
//! configuration and a TCP listener.

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{AppState, router};
