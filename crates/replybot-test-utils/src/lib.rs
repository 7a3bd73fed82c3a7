// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for replybot integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without network access.
//!
//! # Components
//!
//! - [`MockFeed`] - in-memory social feed with mention injection and post capture
//! - [`MockProvider`] - LLM provider that replays queued outcomes
//! - [`TestHarness`] - the full stack on a temp SQLite database

pub mod harness;
pub mod mock_feed;
pub mod mock_provider;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_feed::{CreatedPost, MockFeed};
pub use mock_provider::MockProvider;
