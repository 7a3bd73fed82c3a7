// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Supervisor for the four pipeline loops.

use std::sync::Arc;
use std::time::Duration;

use replybot_config::ReplybotConfig;
use replybot_config::model::ScheduleConfig;
use replybot_core::{FeedAdapter, JobStore, ProviderAdapter, ReplybotError};
use replybot_limiter::RateLimiter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatcher::ReplyDispatcher;
use crate::ingestor::Ingestor;
use crate::reaper::StaleJobReaper;
use crate::worker::ResponseWorker;

/// The four stages, wired to shared collaborators.
pub struct PipelineComponents {
    pub ingestor: Ingestor,
    pub worker: ResponseWorker,
    pub dispatcher: ReplyDispatcher,
    pub reaper: StaleJobReaper,
}

impl PipelineComponents {
    /// Builds every stage from configuration. Fails when no bot handle is set.
    pub fn from_config(
        config: &ReplybotConfig,
        feed: Arc<dyn FeedAdapter>,
        provider: Arc<dyn ProviderAdapter>,
        store: Arc<dyn JobStore>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, ReplybotError> {
        let handle = config
            .agent
            .mention_handle()
            .ok_or_else(|| ReplybotError::Config("agent.bot_handle is not set".into()))?;

        Ok(Self {
            ingestor: Ingestor::new(
                feed.clone(),
                store.clone(),
                handle,
                config.bluesky.page_size,
            ),
            worker: ResponseWorker::new(
                provider,
                store.clone(),
                limiter,
                config.agent.models.clone(),
                config.agent.enable_grounding,
                config.agent.max_retries,
            ),
            dispatcher: ReplyDispatcher::new(feed, store.clone(), config.dispatch.clone()),
            reaper: StaleJobReaper::new(store, config.schedule.stale_timeout()),
        })
    }
}

/// Running pipeline. Ingestion stops first on shutdown so no new work
/// enters while in-flight jobs drain.
pub struct Pipeline {
    ingest_cancel: CancellationToken,
    cancel: CancellationToken,
    ingest: JoinHandle<()>,
    stages: Vec<(&'static str, JoinHandle<()>)>,
}

impl Pipeline {
    /// Spawns the four loops on the current runtime.
    pub fn start(components: PipelineComponents, schedule: &ScheduleConfig) -> Self {
        let cancel = CancellationToken::new();
        let ingest_cancel = cancel.child_token();

        let PipelineComponents {
            ingestor,
            worker,
            dispatcher,
            reaper,
        } = components;

        let ingest = tokio::spawn(ingestor.run(schedule.ingest_interval(), ingest_cancel.clone()));
        let stages = vec![
            (
                "worker",
                tokio::spawn(worker.run(schedule.worker_interval(), cancel.clone())),
            ),
            (
                "dispatcher",
                tokio::spawn(dispatcher.run(schedule.dispatch_interval(), cancel.clone())),
            ),
            (
                "reaper",
                tokio::spawn(reaper.run(schedule.reaper_interval(), cancel.clone())),
            ),
        ];

        info!("pipeline started");
        Self {
            ingest_cancel,
            cancel,
            ingest,
            stages,
        }
    }

    /// Stops ingestion, then gives the other loops `grace` to finish their
    /// current tick before aborting them. Returns `true` when all drained.
    pub async fn shutdown(self, grace: Duration) -> bool {
        info!("stopping ingestion");
        self.ingest_cancel.cancel();
        if let Err(e) = self.ingest.await {
            warn!(error = %e, "ingestor task ended abnormally");
        }

        info!(grace_secs = grace.as_secs(), "waiting for workers to complete");
        self.cancel.cancel();

        let mut stages = self.stages;
        let drain = async {
            for (name, handle) in stages.iter_mut() {
                if let Err(e) = handle.await {
                    warn!(stage = *name, error = %e, "stage task ended abnormally");
                }
            }
        };

        let drained = tokio::time::timeout(grace, drain).await.is_ok();
        if drained {
            info!("all stages stopped gracefully");
        } else {
            warn!(grace_secs = grace.as_secs(), "shutdown grace period expired, aborting stages");
            for (_, handle) in &stages {
                handle.abort();
            }
        }
        drained
    }
}
