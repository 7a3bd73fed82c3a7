// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pulls unread mentions from the feed into the job queue.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use replybot_core::types::{EnqueueOutcome, FeedSession, NewJob, Notification};
use replybot_core::{FeedAdapter, JobStore, ReplybotError};
use replybot_text::{clean_mention_text, mentions_handle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::schedule::ticker;

/// Upper bound on pages read per tick.
const MAX_PAGES: usize = 50;

/// What one ingestion tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub unread: usize,
    pub enqueued: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub errors: usize,
}

pub struct Ingestor {
    feed: Arc<dyn FeedAdapter>,
    store: Arc<dyn JobStore>,
    bot_handle: String,
    page_size: u32,
}

impl Ingestor {
    pub fn new(
        feed: Arc<dyn FeedAdapter>,
        store: Arc<dyn JobStore>,
        bot_handle: impl Into<String>,
        page_size: u32,
    ) -> Self {
        Self {
            feed,
            store,
            bot_handle: bot_handle.into(),
            page_size,
        }
    }

    /// Runs one tick per `period` until `cancel` fires.
    pub async fn run(self, period: Duration, cancel: CancellationToken) {
        info!(handle = %self.bot_handle, "ingestor started");
        let mut ticker = ticker(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "ingestion tick failed");
                    }
                }
            }
        }
        info!("ingestor stopped");
    }

    /// Authenticates, collects unread mentions, marks them seen and enqueues them.
    pub async fn run_once(&self) -> Result<IngestReport, ReplybotError> {
        let session = self.feed.authenticate().await?;
        let unread = self.fetch_unread(&session).await?;

        let mut report = IngestReport {
            unread: unread.len(),
            ..IngestReport::default()
        };
        if unread.is_empty() {
            return Ok(report);
        }

        if let Err(e) = self.feed.mark_notifications_seen(&session, Utc::now()).await {
            warn!(error = %e, "failed to mark notifications seen");
        }

        for notification in unread {
            let Some(job) = self.to_job(notification) else {
                report.skipped += 1;
                continue;
            };
            match self.store.enqueue(&job).await {
                Ok(EnqueueOutcome::Inserted(id)) => {
                    info!(job_id = id, author = %job.author_handle, "mention queued");
                    report.enqueued += 1;
                }
                Ok(EnqueueOutcome::AlreadyExists) => {
                    debug!(uri = %job.message_uri, "mention already known");
                    report.duplicates += 1;
                }
                Err(e) => {
                    error!(uri = %job.message_uri, error = %e, "failed to enqueue mention");
                    report.errors += 1;
                }
            }
        }

        if report.enqueued > 0 {
            info!(
                enqueued = report.enqueued,
                duplicates = report.duplicates,
                skipped = report.skipped,
                "ingestion tick complete"
            );
        }
        Ok(report)
    }

    /// Newest-first pages until a read notification or the last page.
    async fn fetch_unread(&self, session: &FeedSession) -> Result<Vec<Notification>, ReplybotError> {
        let mut unread = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self
                .feed
                .list_mention_notifications(session, cursor.as_deref(), self.page_size)
                .await?;

            let mut reached_read = false;
            for notification in page.notifications {
                if notification.is_read {
                    reached_read = true;
                    break;
                }
                unread.push(notification);
            }

            match page.cursor {
                Some(next) if !reached_read => cursor = Some(next),
                _ => return Ok(unread),
            }
        }

        warn!(pages = MAX_PAGES, "stopped paging notifications early");
        Ok(unread)
    }

    fn to_job(&self, notification: Notification) -> Option<NewJob> {
        if !mentions_handle(&notification.text, &self.bot_handle) {
            debug!(uri = %notification.uri, "notification does not mention the bot");
            return None;
        }
        let content = clean_mention_text(&notification.text, &self.bot_handle);
        if content.is_empty() {
            debug!(uri = %notification.uri, "mention has no question");
            return None;
        }
        Some(NewJob {
            message_uri: notification.uri,
            message_cid: notification.cid,
            author_did: notification.author_did,
            author_handle: notification.author_handle,
            content,
        })
    }
}
