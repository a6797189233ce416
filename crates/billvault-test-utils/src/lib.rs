// SPDX-FileCopyrightText: 2026 Billvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Billvault integration tests.
//!
//! Provides a temp-directory harness and failure-injecting adapters for
//! fast, deterministic tests without external services.
//!
//! # Components
//!
//! - [`TestHarness`] - vault engine, payload store, and SQLite subscription store in a temp dir
//! - [`FlakyPayloadStore`] - payload store wrapper with switchable write/delete failures
//! - [`events`] - billing event constructors

pub mod events;
pub mod flaky_store;
pub mod harness;

pub use flaky_store::FlakyPayloadStore;
pub use harness::TestHarness;
