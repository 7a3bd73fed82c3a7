// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bluesky feed adapter for the replybot pipeline.
//!
//! Implements [`FeedAdapter`] over the AT Protocol XRPC endpoints:
//! session creation, mention notification listing, marking notifications
//! seen, and creating reply posts.

pub mod client;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use replybot_config::model::BlueskyConfig;
use replybot_core::error::ReplybotError;
use replybot_core::traits::{FeedAdapter, PluginAdapter};
use replybot_core::types::{
    AdapterType, FeedSession, HealthStatus, Notification, NotificationPage, PostRef,
};
use tracing::{debug, info};

use crate::client::XrpcClient;
use crate::types::{
    CreateRecordRequest, CreateRecordResponse, CreateSessionRequest, CreateSessionResponse,
    ListNotificationsResponse, POST_COLLECTION, PostRecord, ReplyRef, StrongRef,
    UpdateSeenRequest,
};

/// Notification reason filter sent with every listing call.
const MENTION_REASON: &str = "mention";

/// Bluesky account adapter implementing [`FeedAdapter`].
pub struct BlueskyFeed {
    client: XrpcClient,
    identifier: String,
    app_password: String,
}

impl BlueskyFeed {
    /// Creates the adapter; fails when the account credentials are not configured.
    pub fn new(config: &BlueskyConfig) -> Result<Self, ReplybotError> {
        let identifier = config
            .identifier
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ReplybotError::Config("bluesky.identifier is not set".into()))?;
        let app_password = config
            .app_password
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ReplybotError::Config("bluesky.app_password is not set".into()))?;

        info!(host = %config.host, identifier = %identifier, "Bluesky feed initialized");
        Ok(Self {
            client: XrpcClient::new(&config.host)?,
            identifier,
            app_password,
        })
    }
}

#[async_trait]
impl PluginAdapter for BlueskyFeed {
    fn name(&self) -> &str {
        "bluesky"
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
        debug!("Bluesky feed shutting down");
        Ok(())
    }
}

#[async_trait]
impl FeedAdapter for BlueskyFeed {
    async fn authenticate(&self) -> Result<FeedSession, ReplybotError> {
        let session: CreateSessionResponse = self
            .client
            .procedure(
                "com.atproto.server.createSession",
                None,
                &CreateSessionRequest {
                    identifier: &self.identifier,
                    password: &self.app_password,
                },
            )
            .await?;
        debug!(did = %session.did, handle = %session.handle, "Bluesky session created");
        Ok(FeedSession {
            did: session.did,
            handle: session.handle,
            access_token: session.access_jwt,
        })
    }

    async fn list_mention_notifications(
        &self,
        session: &FeedSession,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<NotificationPage, ReplybotError> {
        let limit = page_size.to_string();
        let mut params = vec![("limit", limit.as_str()), ("reasons", MENTION_REASON)];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let response: ListNotificationsResponse = self
            .client
            .query(
                "app.bsky.notification.listNotifications",
                &session.access_token,
                &params,
            )
            .await?;

        let notifications = response
            .notifications
            .into_iter()
            .filter(|n| n.reason == MENTION_REASON)
            .map(|n| Notification {
                text: n.post_text(),
                uri: n.uri,
                cid: n.cid,
                author_did: n.author.did,
                author_handle: n.author.handle,
                is_read: n.is_read,
            })
            .collect();

        Ok(NotificationPage {
            notifications,
            cursor: response.cursor.filter(|c| !c.is_empty()),
        })
    }

    async fn mark_notifications_seen(
        &self,
        session: &FeedSession,
        seen_at: DateTime<Utc>,
    ) -> Result<(), ReplybotError> {
        self.client
            .procedure_no_output(
                "app.bsky.notification.updateSeen",
                Some(&session.access_token),
                &UpdateSeenRequest {
                    seen_at: seen_at.to_rfc3339_opts(SecondsFormat::Millis, true),
                },
            )
            .await
    }

    async fn create_post(
        &self,
        session: &FeedSession,
        parent: &PostRef,
        root: &PostRef,
        text: &str,
    ) -> Result<PostRef, ReplybotError> {
        let body = CreateRecordRequest {
            repo: &session.did,
            collection: POST_COLLECTION,
            record: PostRecord {
                type_: POST_COLLECTION,
                text,
                created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                reply: ReplyRef {
                    root: StrongRef {
                        uri: &root.uri,
                        cid: &root.cid,
                    },
                    parent: StrongRef {
                        uri: &parent.uri,
                        cid: &parent.cid,
                    },
                },
            },
        };
        let created: CreateRecordResponse = self
            .client
            .procedure(
                "com.atproto.repo.createRecord",
                Some(&session.access_token),
                &body,
            )
            .await?;
        Ok(PostRef {
            uri: created.uri,
            cid: created.cid,
        })
    }
}
