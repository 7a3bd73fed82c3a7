// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Every external collaborator sits behind one of these traits and uses
//! `#[async_trait]` so the pipeline can hold them as trait objects.

pub mod adapter;
pub mod feed;
pub mod provider;
pub mod storage;

pub use adapter::PluginAdapter;
pub use feed::FeedAdapter;
pub use provider::ProviderAdapter;
pub use storage::{JobStore, QuotaStore, StorageAdapter};
