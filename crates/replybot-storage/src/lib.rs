// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the replybot pipeline.
//!
//! WAL-mode SQLite with embedded refinery migrations, accessed through
//! `tokio-rusqlite`. Holds the active job queue, the append-only job
//! history, and the rate limiter's quota counters.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
