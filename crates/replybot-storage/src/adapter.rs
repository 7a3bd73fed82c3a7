// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage, job and quota traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use replybot_config::model::StorageConfig;
use replybot_core::types::{
    EnqueueOutcome, FailureOutcome, Finalization, GroundingFeature, GroundingQuotaRecord,
    HistoryRecord, Job, ModelId, ModelQuotaRecord, NewJob, QueueCounts,
};
use replybot_core::{
    AdapterType, HealthStatus, JobStore, PluginAdapter, QuotaStore, ReplybotError,
    StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed message store.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other
/// operation fails with a storage error until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, ReplybotError> {
        self.db
            .get()
            .ok_or_else(|| ReplybotError::storage("storage not initialized, call initialize() first"))
    }

    async fn checkpoint(&self) -> Result<(), ReplybotError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| -> Result<(), rusqlite::Error> {
                    conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
                })
                .await
                .map_err(map_tr_err)?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ReplybotError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ReplybotError> {
        self.checkpoint().await
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ReplybotError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| ReplybotError::storage("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ReplybotError> {
        self.db()?;
        self.checkpoint().await
    }
}

#[async_trait]
impl JobStore for SqliteStorage {
    async fn enqueue(&self, job: &NewJob) -> Result<EnqueueOutcome, ReplybotError> {
        queries::jobs::enqueue(self.db()?, job).await
    }

    async fn claim_next(&self) -> Result<Option<Job>, ReplybotError> {
        queries::jobs::claim_next(self.db()?).await
    }

    async fn complete_with_response(
        &self,
        id: i64,
        response: &str,
        model_name: &str,
        used_grounding: bool,
    ) -> Result<(), ReplybotError> {
        queries::jobs::complete_with_response(self.db()?, id, response, model_name, used_grounding)
            .await
    }

    async fn mark_failed(
        &self,
        id: i64,
        error: &str,
        max_retries: u32,
        fallback: &str,
    ) -> Result<FailureOutcome, ReplybotError> {
        queries::jobs::mark_failed(self.db()?, id, error, max_retries, fallback).await
    }

    async fn fetch_ready(&self, limit: u32) -> Result<Vec<Job>, ReplybotError> {
        queries::jobs::fetch_ready(self.db()?, limit).await
    }

    async fn finalize(&self, id: i64, outcome: &Finalization) -> Result<(), ReplybotError> {
        queries::history::finalize(self.db()?, id, outcome).await
    }

    async fn reap_stale(&self, timeout: Duration) -> Result<Vec<i64>, ReplybotError> {
        let cutoff = TimeDelta::from_std(timeout)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        queries::jobs::reap_stale_before(self.db()?, cutoff).await
    }

    async fn queue_counts(&self) -> Result<QueueCounts, ReplybotError> {
        queries::jobs::queue_counts(self.db()?).await
    }

    async fn history_for(&self, message_uri: &str) -> Result<Vec<HistoryRecord>, ReplybotError> {
        queries::history::history_for(self.db()?, message_uri).await
    }
}

#[async_trait]
impl QuotaStore for SqliteStorage {
    async fn load_model_quota(
        &self,
        model: ModelId,
    ) -> Result<Option<ModelQuotaRecord>, ReplybotError> {
        queries::quota::load_model_quota(self.db()?, model).await
    }

    async fn save_model_quota(&self, record: &ModelQuotaRecord) -> Result<(), ReplybotError> {
        queries::quota::save_model_quota(self.db()?, record).await
    }

    async fn load_grounding_quota(
        &self,
        feature: GroundingFeature,
    ) -> Result<Option<GroundingQuotaRecord>, ReplybotError> {
        queries::quota::load_grounding_quota(self.db()?, feature).await
    }

    async fn save_grounding_quota(
        &self,
        record: &GroundingQuotaRecord,
    ) -> Result<(), ReplybotError> {
        queries::quota::save_grounding_quota(self.db()?, record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn storage_in(dir: &tempfile::TempDir) -> SqliteStorage {
        SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("adapter.db").to_string_lossy().into_owned(),
            wal_mode: true,
        })
    }

    #[tokio::test]
    async fn operations_fail_before_initialize() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir);
        assert!(storage.claim_next().await.is_err());
        assert_eq!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy("not initialized".into())
        );
    }

    #[tokio::test]
    async fn initialize_twice_errors() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir);
        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn reap_stale_through_trait() {
        let dir = tempdir().unwrap();
        let storage = storage_in(&dir);
        storage.initialize().await.unwrap();
        storage
            .enqueue(&NewJob {
                message_uri: "at://did:plc:carol/app.bsky.feed.post/1".into(),
                message_cid: "bafycarol".into(),
                author_did: "did:plc:carol".into(),
                author_handle: "carol.bsky.social".into(),
                content: "hello".into(),
            })
            .await
            .unwrap();
        let job = storage.claim_next().await.unwrap().unwrap();

        // a long timeout leaves the fresh claim alone, a zero timeout reclaims it
        assert!(storage.reap_stale(Duration::from_secs(600)).await.unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(storage.reap_stale(Duration::ZERO).await.unwrap(), vec![job.id]);
        assert_eq!(storage.queue_counts().await.unwrap().queued, 1);
        storage.shutdown().await.unwrap();
    }
}
