// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full pipeline with mock adapters, a temp
//! SQLite database and a manual clock for the rate limiter. Stages are
//! driven tick by tick so tests stay deterministic.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use replybot_config::ReplybotConfig;
use replybot_config::model::StorageConfig;
use replybot_core::types::ModelId;
use replybot_core::{ReplybotError, StorageAdapter};
use replybot_limiter::{ManualClock, RateLimiter};
use replybot_pipeline::{
    DispatchReport, IngestReport, Ingestor, PipelineComponents, ReplyDispatcher,
    ResponseWorker, StaleJobReaper, WorkOutcome,
};
use replybot_storage::SqliteStorage;
use tokio_util::sync::CancellationToken;

use crate::mock_feed::MockFeed;
use crate::mock_provider::MockProvider;

/// Handle the harness bot answers to.
pub const BOT_HANDLE: &str = "@replybot.test";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    config: ReplybotConfig,
    start: DateTime<Utc>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = ReplybotConfig::default();
        config.agent.bot_handle = Some(BOT_HANDLE.to_string());
        config.dispatch.inter_job_delay_ms = 0;
        Self {
            responses: Vec::new(),
            config,
            start: DateTime::parse_from_rfc3339("2026-03-10T20:00:00Z")
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }

    /// Set mock provider responses.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Adjust the configuration before the stack is built.
    pub fn with_config(mut self, edit: impl FnOnce(&mut ReplybotConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    pub fn with_models(mut self, models: Vec<ModelId>) -> Self {
        self.config.agent.models = models;
        self
    }

    /// Start time of the limiter's manual clock.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub async fn build(self) -> Result<TestHarness, ReplybotError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ReplybotError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("replybot.db");

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };

        let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
        storage.initialize().await?;

        let clock = Arc::new(ManualClock::new(self.start));
        let limiter = Arc::new(RateLimiter::with_clock(
            &config.limiter,
            storage.clone(),
            clock.clone(),
        )?);
        limiter.load().await;

        let provider = Arc::new(if self.responses.is_empty() {
            MockProvider::new()
        } else {
            MockProvider::with_responses(self.responses)
        });

        Ok(TestHarness {
            feed: Arc::new(MockFeed::new()),
            provider,
            storage,
            limiter,
            clock,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    pub feed: Arc<MockFeed>,
    pub provider: Arc<MockProvider>,
    /// SQLite storage (temp DB, removed on drop).
    pub storage: Arc<SqliteStorage>,
    pub limiter: Arc<RateLimiter>,
    pub clock: Arc<ManualClock>,
    pub config: ReplybotConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// All four stages wired to this harness's collaborators.
    pub fn components(&self) -> Result<PipelineComponents, ReplybotError> {
        PipelineComponents::from_config(
            &self.config,
            self.feed.clone(),
            self.provider.clone(),
            self.storage.clone(),
            self.limiter.clone(),
        )
    }

    pub fn ingestor(&self) -> Result<Ingestor, ReplybotError> {
        Ok(self.components()?.ingestor)
    }

    pub fn worker(&self) -> Result<ResponseWorker, ReplybotError> {
        Ok(self.components()?.worker)
    }

    pub fn dispatcher(&self) -> Result<ReplyDispatcher, ReplybotError> {
        Ok(self.components()?.dispatcher)
    }

    pub fn reaper(&self) -> Result<StaleJobReaper, ReplybotError> {
        Ok(self.components()?.reaper)
    }

    pub async fn ingest(&self) -> Result<IngestReport, ReplybotError> {
        self.ingestor()?.run_once().await
    }

    /// Runs worker ticks until the queue is empty; returns every outcome.
    pub async fn work_until_idle(&self) -> Result<Vec<WorkOutcome>, ReplybotError> {
        let worker = self.worker()?;
        let mut outcomes = Vec::new();
        loop {
            match worker.run_once().await? {
                WorkOutcome::Idle => return Ok(outcomes),
                outcome => outcomes.push(outcome),
            }
        }
    }

    pub async fn dispatch(&self) -> Result<DispatchReport, ReplybotError> {
        self.dispatcher()?.run_once(&CancellationToken::new()).await
    }

    /// One ingest, work and dispatch pass.
    pub async fn run_cycle(&self) -> Result<DispatchReport, ReplybotError> {
        self.ingest().await?;
        self.work_until_idle().await?;
        self.dispatch().await
    }
}
