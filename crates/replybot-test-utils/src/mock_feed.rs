// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory social feed for deterministic testing.
//!
//! `MockFeed` serves injected mentions newest-first in cursor-linked pages,
//! marks them read on `mark_notifications_seen`, and records every created
//! post so tests can inspect the resulting thread.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use replybot_core::ReplybotError;
use replybot_core::traits::{FeedAdapter, PluginAdapter};
use replybot_core::types::{
    AdapterType, FeedSession, HealthStatus, Notification, NotificationPage, PostRef,
};

pub const BOT_DID: &str = "did:plc:replybot";

/// A post created through [`FeedAdapter::create_post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPost {
    pub post: PostRef,
    pub parent: PostRef,
    pub root: PostRef,
    pub text: String,
}

#[derive(Default)]
pub struct MockFeed {
    /// Newest first.
    notifications: Mutex<Vec<Notification>>,
    posts: Mutex<Vec<CreatedPost>>,
    fail_auth: Mutex<bool>,
    /// Fail the create_post call made when this many posts already exist.
    fail_post_at: Mutex<Option<usize>>,
    auth_calls: AtomicUsize,
    seen_calls: AtomicUsize,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an unread mention from `author` as the newest notification.
    pub async fn add_mention(&self, id: &str, author: &str, text: &str) -> PostRef {
        let post = PostRef {
            uri: format!("at://did:plc:{author}/app.bsky.feed.post/{id}"),
            cid: format!("bafy-{id}"),
        };
        self.notifications.lock().await.insert(
            0,
            Notification {
                uri: post.uri.clone(),
                cid: post.cid.clone(),
                author_did: format!("did:plc:{author}"),
                author_handle: format!("{author}.bsky.social"),
                text: text.to_string(),
                is_read: false,
            },
        );
        post
    }

    /// Marks every notification unread again, as if the seen marker was lost.
    pub async fn mark_all_unread(&self) {
        for notification in self.notifications.lock().await.iter_mut() {
            notification.is_read = false;
        }
    }

    pub async fn fail_authentication(&self, fail: bool) {
        *self.fail_auth.lock().await = fail;
    }

    pub async fn fail_post_at(&self, existing_posts: Option<usize>) {
        *self.fail_post_at.lock().await = existing_posts;
    }

    pub async fn posts(&self) -> Vec<CreatedPost> {
        self.posts.lock().await.clone()
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn seen_calls(&self) -> usize {
        self.seen_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for MockFeed {
    fn name(&self) -> &str {
        "mock-feed"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Feed
    }

    async fn health_check(&self) -> Result<HealthStatus, ReplybotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ReplybotError> {
        Ok(())
    }
}

#[async_trait]
impl FeedAdapter for MockFeed {
    async fn authenticate(&self) -> Result<FeedSession, ReplybotError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_auth.lock().await {
            return Err(ReplybotError::feed(
                "com.atproto.server.createSession returned 401 Unauthorized",
            ));
        }
        Ok(FeedSession {
            did: BOT_DID.to_string(),
            handle: "replybot.test".to_string(),
            access_token: "mock-token".to_string(),
        })
    }

    async fn list_mention_notifications(
        &self,
        _session: &FeedSession,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<NotificationPage, ReplybotError> {
        let start = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| ReplybotError::feed(format!("invalid cursor `{c}`")))?,
            None => 0,
        };
        let all = self.notifications.lock().await;
        let end = (start + page_size.max(1) as usize).min(all.len());
        let notifications = all.get(start..end).unwrap_or_default().to_vec();
        let cursor = (end < all.len()).then(|| end.to_string());
        Ok(NotificationPage {
            notifications,
            cursor,
        })
    }

    async fn mark_notifications_seen(
        &self,
        _session: &FeedSession,
        _seen_at: DateTime<Utc>,
    ) -> Result<(), ReplybotError> {
        self.seen_calls.fetch_add(1, Ordering::SeqCst);
        for notification in self.notifications.lock().await.iter_mut() {
            notification.is_read = true;
        }
        Ok(())
    }

    async fn create_post(
        &self,
        session: &FeedSession,
        parent: &PostRef,
        root: &PostRef,
        text: &str,
    ) -> Result<PostRef, ReplybotError> {
        let mut posts = self.posts.lock().await;
        if *self.fail_post_at.lock().await == Some(posts.len()) {
            return Err(ReplybotError::feed(
                "com.atproto.repo.createRecord returned 502 Bad Gateway",
            ));
        }
        let n = posts.len() + 1;
        let post = PostRef {
            uri: format!("at://{}/app.bsky.feed.post/reply{n}", session.did),
            cid: format!("bafy-reply{n}"),
        };
        posts.push(CreatedPost {
            post: post.clone(),
            parent: parent.clone(),
            root: root.clone(),
            text: text.to_string(),
        });
        Ok(post)
    }
}
