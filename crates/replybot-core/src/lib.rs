// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the replybot pipeline.
//!
//! Holds the shared error type, the domain types that cross crate
//! boundaries (jobs, quota records, feed and provider payloads), and the
//! adapter traits every collaborator implements.

pub mod error;
pub mod traits;
pub mod types;

pub use error::ReplybotError;
pub use types::{AdapterType, HealthStatus, JobStatus, ModelId};

pub use traits::{FeedAdapter, JobStore, PluginAdapter, ProviderAdapter, QuotaStore, StorageAdapter};
