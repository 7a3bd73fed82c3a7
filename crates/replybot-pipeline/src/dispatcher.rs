// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Posts ready responses as reply threads and archives the jobs.

use std::sync::Arc;
use std::time::Duration;

use replybot_config::model::DispatchConfig;
use replybot_core::types::{FeedSession, Finalization, Job, JobStatus, PostRef};
use replybot_core::{FeedAdapter, JobStore, ReplybotError};
use replybot_text::{attribution_suffix, compose_reply};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::schedule::ticker;

/// What one dispatch tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub completed: usize,
    pub failed: usize,
    /// Jobs left in `ready` because shutdown was requested.
    pub deferred: usize,
}

pub struct ReplyDispatcher {
    feed: Arc<dyn FeedAdapter>,
    store: Arc<dyn JobStore>,
    config: DispatchConfig,
}

impl ReplyDispatcher {
    pub fn new(feed: Arc<dyn FeedAdapter>, store: Arc<dyn JobStore>, config: DispatchConfig) -> Self {
        Self { feed, store, config }
    }

    pub async fn run(self, period: Duration, cancel: CancellationToken) {
        info!(batch_size = self.config.batch_size, "reply dispatcher started");
        let mut ticker = ticker(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once(&cancel).await {
                        error!(error = %e, "dispatch tick failed");
                    }
                }
            }
        }
        info!("reply dispatcher stopped");
    }

    /// Sends one batch of ready replies, pausing between jobs.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<DispatchReport, ReplybotError> {
        let jobs = self.store.fetch_ready(self.config.batch_size).await?;
        let mut report = DispatchReport::default();
        if jobs.is_empty() {
            return Ok(report);
        }

        let session = self.feed.authenticate().await?;
        let delay = self.config.inter_job_delay();

        for (index, job) in jobs.iter().enumerate() {
            if cancel.is_cancelled() {
                report.deferred = jobs.len() - index;
                info!(deferred = report.deferred, "dispatch cancelled, leaving jobs ready");
                break;
            }

            let outcome = self.send_reply(&session, job, cancel).await;
            match outcome.status {
                JobStatus::Completed => {
                    info!(job_id = job.id, "reply sent");
                    report.completed += 1;
                }
                _ => {
                    warn!(job_id = job.id, error = ?outcome.error, "reply failed");
                    report.failed += 1;
                }
            }
            if let Err(e) = self.store.finalize(job.id, &outcome).await {
                error!(job_id = job.id, error = %e, "failed to archive job");
            }

            if index + 1 < jobs.len() && !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        Ok(report)
    }

    /// Posts the thread for `job`; parent is the previous post, root the mention.
    async fn send_reply(
        &self,
        session: &FeedSession,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Finalization {
        let Some(response) = job.response.as_deref().filter(|r| !r.trim().is_empty()) else {
            return Finalization::failed(None, format!("job {} has no response", job.id));
        };

        let suffix = job
            .model_name
            .as_deref()
            .filter(|name| self.config.attribution && !name.is_empty())
            .map(attribution_suffix);
        let posts = compose_reply(
            response,
            suffix.as_deref(),
            self.config.post_budget,
            self.config.thread_budget,
        );

        let root = job.mention_ref();
        let mut parent = root.clone();
        let mut first: Option<PostRef> = None;

        for (index, text) in posts.iter().enumerate() {
            if index > 0 && cancel.is_cancelled() {
                return Finalization::failed(
                    first,
                    format!("cancelled after {index} of {} posts", posts.len()),
                );
            }
            match self.feed.create_post(session, &parent, &root, text).await {
                Ok(post) => {
                    if first.is_none() {
                        first = Some(post.clone());
                    }
                    parent = post;
                }
                Err(e) => {
                    return Finalization::failed(
                        first,
                        format!("post {} of {} failed: {e}", index + 1, posts.len()),
                    );
                }
            }
        }

        match first {
            Some(reply) => Finalization::completed(reply),
            None => Finalization::failed(None, "nothing to post"),
        }
    }
}
