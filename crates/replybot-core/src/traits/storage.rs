// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage traits: backend lifecycle, the job queue, and quota persistence.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ReplybotError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    EnqueueOutcome, FailureOutcome, Finalization, GroundingFeature, GroundingQuotaRecord,
    HistoryRecord, Job, ModelId, ModelQuotaRecord, NewJob, QueueCounts,
};

/// Lifecycle of a persistence backend.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Opens the backend and applies migrations.
    async fn initialize(&self) -> Result<(), ReplybotError>;

    /// Flushes pending writes and releases the connection.
    async fn close(&self) -> Result<(), ReplybotError>;
}

/// The job queue shared by all pipeline loops.
///
/// Claim and finalize rely on the backend's atomic single-statement updates
/// and transactions, never on an in-process lock.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a job unless its identity is already queued or archived.
    async fn enqueue(&self, job: &NewJob) -> Result<EnqueueOutcome, ReplybotError>;

    /// Atomically moves the oldest queued job to `processing`.
    async fn claim_next(&self) -> Result<Option<Job>, ReplybotError>;

    /// Stores a generated response and moves the job to `ready`.
    async fn complete_with_response(
        &self,
        id: i64,
        response: &str,
        model_name: &str,
        used_grounding: bool,
    ) -> Result<(), ReplybotError>;

    /// Records a generation failure; installs `fallback` once `max_retries` is reached.
    /// Errors when the job is no longer in `processing`.
    async fn mark_failed(
        &self,
        id: i64,
        error: &str,
        max_retries: u32,
        fallback: &str,
    ) -> Result<FailureOutcome, ReplybotError>;

    /// Returns up to `limit` jobs in `ready`, oldest first.
    async fn fetch_ready(&self, limit: u32) -> Result<Vec<Job>, ReplybotError>;

    /// Archives the job with its dispatch outcome and removes it from the queue.
    async fn finalize(&self, id: i64, outcome: &Finalization) -> Result<(), ReplybotError>;

    /// Returns jobs stuck in `processing` longer than `timeout` to the queue.
    async fn reap_stale(&self, timeout: Duration) -> Result<Vec<i64>, ReplybotError>;

    /// Per-status counts for operators.
    async fn queue_counts(&self) -> Result<QueueCounts, ReplybotError>;

    /// Archived records for one mention.
    async fn history_for(&self, message_uri: &str) -> Result<Vec<HistoryRecord>, ReplybotError>;
}

/// Crash-recovery persistence for the rate limiter.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn load_model_quota(
        &self,
        model: ModelId,
    ) -> Result<Option<ModelQuotaRecord>, ReplybotError>;

    async fn save_model_quota(&self, record: &ModelQuotaRecord) -> Result<(), ReplybotError>;

    async fn load_grounding_quota(
        &self,
        feature: GroundingFeature,
    ) -> Result<Option<GroundingQuotaRecord>, ReplybotError>;

    async fn save_grounding_quota(
        &self,
        record: &GroundingQuotaRecord,
    ) -> Result<(), ReplybotError>;
}
