// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job queue operations: insert-if-new, atomic claim, retry, stale recovery.

use chrono::{DateTime, Utc};
use replybot_core::types::{EnqueueOutcome, FailureOutcome, Job, NewJob, QueueCounts};
use replybot_core::{JobStatus, ReplybotError};
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};

use crate::database::{Database, format_timestamp, map_tr_err};
use crate::queries::parse_column;

pub(crate) const JOB_COLUMNS: &str = "id, message_uri, message_cid, author_did, author_handle, \
     content, status, response, model_name, used_grounding, retry_count, error_message, \
     received_at, processing_started_at";

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

pub(crate) fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        message_uri: row.get(1)?,
        message_cid: row.get(2)?,
        author_did: row.get(3)?,
        author_handle: row.get(4)?,
        content: row.get(5)?,
        status: parse_column(6, row.get(6)?)?,
        response: row.get(7)?,
        model_name: row.get(8)?,
        used_grounding: row.get(9)?,
        retry_count: row.get(10)?,
        error_message: row.get(11)?,
        received_at: row.get(12)?,
        processing_started_at: row.get(13)?,
    })
}

/// Insert a job unless the same message is already queued or archived.
pub async fn enqueue(db: &Database, job: &NewJob) -> Result<EnqueueOutcome, ReplybotError> {
    let job = job.clone();
    db.connection()
        .call(move |conn| {
            // The WHERE clause is required for SQLite to parse ON CONFLICT after a SELECT.
            let inserted = conn.execute(
                "INSERT INTO jobs (message_uri, message_cid, author_did, author_handle, content)
                 SELECT ?1, ?2, ?3, ?4, ?5
                 WHERE NOT EXISTS (
                     SELECT 1 FROM job_history WHERE message_uri = ?1 AND message_cid = ?2
                 )
                 ON CONFLICT (message_uri, message_cid) DO NOTHING",
                params![
                    job.message_uri,
                    job.message_cid,
                    job.author_did,
                    job.author_handle,
                    job.content
                ],
            )?;
            Ok(if inserted == 0 {
                EnqueueOutcome::AlreadyExists
            } else {
                EnqueueOutcome::Inserted(conn.last_insert_rowid())
            })
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the oldest queued job with a single conditional update.
///
/// The `status = 'queued'` guard on the outer update means two claimers that
/// picked the same id cannot both win, even across processes.
pub async fn claim_next(db: &Database) -> Result<Option<Job>, ReplybotError> {
    db.connection()
        .call(|conn| {
            conn.query_row(
                &format!(
                    "UPDATE jobs
                     SET status = 'processing', processing_started_at = {NOW}, updated_at = {NOW}
                     WHERE id = (SELECT id FROM jobs WHERE status = 'queued' ORDER BY id LIMIT 1)
                       AND status = 'queued'
                     RETURNING {JOB_COLUMNS}"
                ),
                [],
                job_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Store a generated response and move the job to `ready`.
pub async fn complete_with_response(
    db: &Database,
    id: i64,
    response: &str,
    model_name: &str,
    used_grounding: bool,
) -> Result<(), ReplybotError> {
    let response = response.to_string();
    let model_name = model_name.to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                &format!(
                    "UPDATE jobs
                     SET status = 'ready', response = ?2, model_name = ?3, used_grounding = ?4,
                         error_message = NULL, updated_at = {NOW}
                     WHERE id = ?1 AND status = 'processing'"
                ),
                params![id, response, model_name, used_grounding],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if updated == 0 {
        return Err(ReplybotError::storage(format!(
            "job {id} is not in processing state"
        )));
    }
    Ok(())
}

/// Record a generation failure.
///
/// Below `max_retries` the job is queued again. At the ceiling `fallback`
/// becomes its response and it moves to `ready` so a reply still goes out.
/// Only a job still in `processing` is touched; anything else is an error.
pub async fn mark_failed(
    db: &Database,
    id: i64,
    error: &str,
    max_retries: u32,
    fallback: &str,
) -> Result<FailureOutcome, ReplybotError> {
    let error = error.to_string();
    let fallback = fallback.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let retry_count: u32 = tx.query_row(
                "SELECT retry_count FROM jobs WHERE id = ?1 AND status = 'processing'",
                params![id],
                |row| row.get(0),
            )?;
            let retry_count = retry_count + 1;

            let outcome = if retry_count >= max_retries {
                tx.execute(
                    &format!(
                        "UPDATE jobs
                         SET status = 'ready', response = ?2, model_name = NULL,
                             used_grounding = 0, retry_count = ?3, error_message = ?4,
                             updated_at = {NOW}
                         WHERE id = ?1 AND status = 'processing'"
                    ),
                    params![id, fallback, retry_count, error],
                )?;
                FailureOutcome::Exhausted { retry_count }
            } else {
                tx.execute(
                    &format!(
                        "UPDATE jobs
                         SET status = 'queued', retry_count = ?2, error_message = ?3,
                             processing_started_at = NULL, updated_at = {NOW}
                         WHERE id = ?1 AND status = 'processing'"
                    ),
                    params![id, retry_count, error],
                )?;
                FailureOutcome::Requeued { retry_count }
            };
            tx.commit()?;
            Ok(outcome)
        })
        .await
        .map_err(map_tr_err)
}

/// Up to `limit` jobs with a response waiting to be posted, oldest first.
pub async fn fetch_ready(db: &Database, limit: u32) -> Result<Vec<Job>, ReplybotError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'ready' ORDER BY id LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], job_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one active job by id.
pub async fn get_job(db: &Database, id: i64) -> Result<Option<Job>, ReplybotError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id],
                job_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Return `processing` jobs claimed before `cutoff` to the queue.
pub async fn reap_stale_before(
    db: &Database,
    cutoff: DateTime<Utc>,
) -> Result<Vec<i64>, ReplybotError> {
    let cutoff = format_timestamp(cutoff);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "UPDATE jobs
                 SET status = 'queued', processing_started_at = NULL, updated_at = {NOW}
                 WHERE status = 'processing' AND processing_started_at < ?1
                 RETURNING id"
            ))?;
            let rows = stmt.query_map(params![cutoff], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Active jobs per status plus archived totals.
pub async fn queue_counts(db: &Database) -> Result<QueueCounts, ReplybotError> {
    db.connection()
        .call(|conn| {
            let mut counts = QueueCounts::default();
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let status: JobStatus = parse_column(0, row.get(0)?)?;
                let n: u64 = row.get(1)?;
                match status {
                    JobStatus::Queued => counts.queued = n,
                    JobStatus::Processing => counts.processing = n,
                    JobStatus::Ready => counts.ready = n,
                    JobStatus::Completed | JobStatus::Failed => {}
                }
            }

            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM job_history GROUP BY status")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let status: JobStatus = parse_column(0, row.get(0)?)?;
                let n: u64 = row.get(1)?;
                match status {
                    JobStatus::Completed => counts.archived_completed = n,
                    JobStatus::Failed => counts.archived_failed = n,
                    _ => {}
                }
            }
            Ok(counts)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn mention(n: u32) -> NewJob {
        NewJob {
            message_uri: format!("at://did:plc:alice/app.bsky.feed.post/{n}"),
            message_cid: format!("bafycid{n}"),
            author_did: "did:plc:alice".into(),
            author_handle: "alice.bsky.social".into(),
            content: format!("question {n}"),
        }
    }

    async fn set_started_at(db: &Database, id: i64, at: &str) {
        let at = at.to_string();
        db.connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "UPDATE jobs SET processing_started_at = ?2 WHERE id = ?1",
                    params![id, at],
                )
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn enqueue_then_claim_lifecycle() {
        let (db, _dir) = setup_db().await;

        let EnqueueOutcome::Inserted(id) = enqueue(&db, &mention(1)).await.unwrap() else {
            panic!("expected insert");
        };

        let job = claim_next(&db).await.unwrap().expect("queued job");
        assert_eq!(job.id, id);
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.content, "question 1");
        assert!(job.processing_started_at.is_some());

        assert!(claim_next(&db).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_not_an_error() {
        let (db, _dir) = setup_db().await;
        assert!(matches!(
            enqueue(&db, &mention(1)).await.unwrap(),
            EnqueueOutcome::Inserted(_)
        ));
        assert_eq!(
            enqueue(&db, &mention(1)).await.unwrap(),
            EnqueueOutcome::AlreadyExists
        );
        assert_eq!(queue_counts(&db).await.unwrap().queued, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn claims_oldest_first() {
        let (db, _dir) = setup_db().await;
        for n in 1..=3 {
            enqueue(&db, &mention(n)).await.unwrap();
        }
        let first = claim_next(&db).await.unwrap().unwrap();
        let second = claim_next(&db).await.unwrap().unwrap();
        assert_eq!(first.content, "question 1");
        assert_eq!(second.content, "question 2");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_claims_are_exclusive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let path = path.to_str().unwrap();
        // two handles on one file behave like two processes
        let a = Database::open(path).await.unwrap();
        let b = Database::open(path).await.unwrap();
        enqueue(&a, &mention(7)).await.unwrap();

        let (ra, rb) = tokio::join!(claim_next(&a), claim_next(&b));
        let claimed: Vec<Job> = [ra.unwrap(), rb.unwrap()].into_iter().flatten().collect();
        assert_eq!(claimed.len(), 1);

        a.close().await.unwrap();
        b.close().await.unwrap();
    }

    #[tokio::test]
    async fn many_claimers_never_share_a_job() {
        let (db, _dir) = setup_db().await;
        for n in 0..20 {
            enqueue(&db, &mention(n)).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..30 {
            let db = db.clone();
            handles.push(tokio::spawn(async move { claim_next(&db).await.unwrap() }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            if let Some(job) = handle.await.unwrap() {
                ids.push(job.id);
            }
        }
        ids.sort_unstable();
        let before = ids.len();
        ids.dedup();
        assert_eq!(before, 20);
        assert_eq!(ids.len(), 20);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn complete_moves_to_ready() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, &mention(1)).await.unwrap();
        let job = claim_next(&db).await.unwrap().unwrap();

        complete_with_response(&db, job.id, "an answer", "gemini-2.5-flash", true)
            .await
            .unwrap();

        let ready = fetch_ready(&db, 10).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].response.as_deref(), Some("an answer"));
        assert_eq!(ready[0].model_name.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(ready[0].used_grounding, Some(true));

        // a second completion finds nothing in processing
        assert!(
            complete_with_response(&db, job.id, "again", "gemini-2.5-flash", false)
                .await
                .is_err()
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failures_below_ceiling_requeue() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, &mention(1)).await.unwrap();

        for expected in 1..=2 {
            let job = claim_next(&db).await.unwrap().unwrap();
            let outcome = mark_failed(&db, job.id, "provider down", 3, "fallback")
                .await
                .unwrap();
            assert_eq!(outcome, FailureOutcome::Requeued { retry_count: expected });
            let job = get_job(&db, job.id).await.unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Queued);
            assert!(job.processing_started_at.is_none());
            assert_eq!(job.error_message.as_deref(), Some("provider down"));
        }

        let job = claim_next(&db).await.unwrap().unwrap();
        complete_with_response(&db, job.id, "real answer", "gemini-2.5-flash", false)
            .await
            .unwrap();
        let job = get_job(&db, job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Ready);
        assert_eq!(job.response.as_deref(), Some("real answer"));
        assert_eq!(job.retry_count, 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn late_failure_does_not_undo_a_newer_claim() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, &mention(1)).await.unwrap();

        let stalled = claim_next(&db).await.unwrap().unwrap();
        let cutoff = chrono::Utc::now() + chrono::TimeDelta::seconds(1);
        assert_eq!(reap_stale_before(&db, cutoff).await.unwrap(), vec![stalled.id]);

        let retried = claim_next(&db).await.unwrap().unwrap();
        assert_eq!(retried.id, stalled.id);
        complete_with_response(&db, retried.id, "real answer", "gemini-2.5-flash", false)
            .await
            .unwrap();

        assert!(
            mark_failed(&db, stalled.id, "timeout", 3, "fallback")
                .await
                .is_err()
        );
        let job = get_job(&db, stalled.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Ready);
        assert_eq!(job.response.as_deref(), Some("real answer"));
        assert_eq!(job.retry_count, 0);
        assert!(job.error_message.is_none());

        // same guard at the ceiling: the real answer is not replaced
        assert!(mark_failed(&db, stalled.id, "timeout", 1, "fallback").await.is_err());
        let job = get_job(&db, stalled.id).await.unwrap().unwrap();
        assert_eq!(job.response.as_deref(), Some("real answer"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failure_at_ceiling_installs_fallback() {
        let (db, _dir) = setup_db().await;
        enqueue(&db, &mention(1)).await.unwrap();

        let mut last = None;
        for _ in 0..3 {
            let job = claim_next(&db).await.unwrap().unwrap();
            last = Some(
                mark_failed(&db, job.id, "boom", 3, "sorry, try later")
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(last, Some(FailureOutcome::Exhausted { retry_count: 3 }));

        let ready = fetch_ready(&db, 10).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].response.as_deref(), Some("sorry, try later"));
        assert!(ready[0].model_name.is_none());
        assert!(claim_next(&db).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn mark_failed_unknown_job_errors() {
        let (db, _dir) = setup_db().await;
        assert!(mark_failed(&db, 99, "x", 3, "f").await.is_err());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reaper_returns_only_old_processing_jobs() {
        let (db, _dir) = setup_db().await;
        for n in 1..=3 {
            enqueue(&db, &mention(n)).await.unwrap();
        }
        let old = claim_next(&db).await.unwrap().unwrap();
        let fresh = claim_next(&db).await.unwrap().unwrap();
        set_started_at(&db, old.id, "2020-01-01T00:00:00.000Z").await;

        let cutoff = chrono::Utc::now() - chrono::TimeDelta::minutes(10);
        let reaped = reap_stale_before(&db, cutoff).await.unwrap();
        assert_eq!(reaped, vec![old.id]);

        let old = get_job(&db, old.id).await.unwrap().unwrap();
        assert_eq!(old.status, JobStatus::Queued);
        assert!(old.processing_started_at.is_none());
        let fresh = get_job(&db, fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, JobStatus::Processing);

        let counts = queue_counts(&db).await.unwrap();
        assert_eq!(counts.queued, 2);
        assert_eq!(counts.processing, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fetch_ready_respects_limit_and_order() {
        let (db, _dir) = setup_db().await;
        for n in 1..=4 {
            enqueue(&db, &mention(n)).await.unwrap();
            let job = claim_next(&db).await.unwrap().unwrap();
            complete_with_response(&db, job.id, &format!("answer {n}"), "m", false)
                .await
                .unwrap();
        }
        let ready = fetch_ready(&db, 2).await.unwrap();
        assert_eq!(ready.len(), 2);
        assert_eq!(ready[0].response.as_deref(), Some("answer 1"));
        assert_eq!(ready[1].response.as_deref(), Some("answer 2"));
        db.close().await.unwrap();
    }
}
