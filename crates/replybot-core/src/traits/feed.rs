// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feed adapter trait for the social network the bot listens on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ReplybotError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{FeedSession, NotificationPage, PostRef};

/// Opaque request/response access to the social feed.
#[async_trait]
pub trait FeedAdapter: PluginAdapter {
    /// Creates a fresh authenticated session.
    async fn authenticate(&self) -> Result<FeedSession, ReplybotError>;

    /// Lists one page of mention notifications, newest first.
    async fn list_mention_notifications(
        &self,
        session: &FeedSession,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<NotificationPage, ReplybotError>;

    /// Marks every notification up to `seen_at` as read.
    async fn mark_notifications_seen(
        &self,
        session: &FeedSession,
        seen_at: DateTime<Utc>,
    ) -> Result<(), ReplybotError>;

    /// Creates a post replying to `parent` inside the thread rooted at `root`.
    async fn create_post(
        &self,
        session: &FeedSession,
        parent: &PostRef,
        root: &PostRef,
        text: &str,
    ) -> Result<PostRef, ReplybotError>;
}
