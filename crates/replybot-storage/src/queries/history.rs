// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archiving finalized jobs.

use replybot_core::ReplybotError;
use replybot_core::types::{Finalization, HistoryRecord};
use rusqlite::{Row, TransactionBehavior, params};

use crate::database::{Database, map_tr_err};
use crate::queries::parse_column;

const HISTORY_COLUMNS: &str = "id, job_id, message_uri, message_cid, author_did, author_handle, \
     content, response, model_name, used_grounding, reply_uri, reply_cid, status, retry_count, \
     error_message, received_at, processing_started_at, finalized_at";

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    Ok(HistoryRecord {
        id: row.get(0)?,
        job_id: row.get(1)?,
        message_uri: row.get(2)?,
        message_cid: row.get(3)?,
        author_did: row.get(4)?,
        author_handle: row.get(5)?,
        content: row.get(6)?,
        response: row.get(7)?,
        model_name: row.get(8)?,
        used_grounding: row.get(9)?,
        reply_uri: row.get(10)?,
        reply_cid: row.get(11)?,
        status: parse_column(12, row.get(12)?)?,
        retry_count: row.get(13)?,
        error_message: row.get(14)?,
        received_at: row.get(15)?,
        processing_started_at: row.get(16)?,
        finalized_at: row.get(17)?,
    })
}

/// Copy the job into `job_history` with its dispatch outcome, then delete it.
///
/// Both statements share one transaction; if either fails the active row is
/// left exactly as it was.
pub async fn finalize(
    db: &Database,
    id: i64,
    outcome: &Finalization,
) -> Result<(), ReplybotError> {
    let status = outcome.status.to_string();
    let reply_uri = outcome.reply.as_ref().map(|r| r.uri.clone());
    let reply_cid = outcome.reply.as_ref().map(|r| r.cid.clone());
    let error = outcome.error.clone();

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let archived = tx.execute(
                "INSERT INTO job_history (
                     job_id, message_uri, message_cid, author_did, author_handle, content,
                     response, model_name, used_grounding, reply_uri, reply_cid, status,
                     retry_count, error_message, received_at, processing_started_at
                 )
                 SELECT id, message_uri, message_cid, author_did, author_handle, content,
                        response, model_name, used_grounding, ?2, ?3, ?4,
                        retry_count, COALESCE(?5, error_message), received_at,
                        processing_started_at
                 FROM jobs WHERE id = ?1",
                params![id, reply_uri, reply_cid, status, error],
            )?;
            if archived == 0 {
                return Err(rusqlite::Error::QueryReturnedNoRows);
            }
            tx.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Archived records for one mention, oldest first.
pub async fn history_for(
    db: &Database,
    message_uri: &str,
) -> Result<Vec<HistoryRecord>, ReplybotError> {
    let message_uri = message_uri.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {HISTORY_COLUMNS} FROM job_history WHERE message_uri = ?1 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params![message_uri], history_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::jobs;
    use replybot_core::JobStatus;
    use replybot_core::types::{EnqueueOutcome, NewJob, PostRef};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn mention() -> NewJob {
        NewJob {
            message_uri: "at://did:plc:bob/app.bsky.feed.post/3k".into(),
            message_cid: "bafybob".into(),
            author_did: "did:plc:bob".into(),
            author_handle: "bob.bsky.social".into(),
            content: "explain recursion".into(),
        }
    }

    async fn ready_job(db: &Database) -> i64 {
        jobs::enqueue(db, &mention()).await.unwrap();
        let job = jobs::claim_next(db).await.unwrap().unwrap();
        jobs::complete_with_response(db, job.id, "a response", "gemini-2.5-flash", false)
            .await
            .unwrap();
        job.id
    }

    #[tokio::test]
    async fn finalize_archives_and_removes() {
        let (db, _dir) = setup_db().await;
        let id = ready_job(&db).await;
        let reply = PostRef {
            uri: "at://did:plc:bot/app.bsky.feed.post/r1".into(),
            cid: "bafyreply".into(),
        };

        finalize(&db, id, &Finalization::completed(reply.clone()))
            .await
            .unwrap();

        assert!(jobs::get_job(&db, id).await.unwrap().is_none());
        let history = history_for(&db, &mention().message_uri).await.unwrap();
        assert_eq!(history.len(), 1);
        let record = &history[0];
        assert_eq!(record.job_id, id);
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.reply_uri.as_deref(), Some(reply.uri.as_str()));
        assert_eq!(record.reply_cid.as_deref(), Some(reply.cid.as_str()));
        assert_eq!(record.response.as_deref(), Some("a response"));
        assert_eq!(record.content, "explain recursion");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn archived_mention_is_not_enqueued_again() {
        let (db, _dir) = setup_db().await;
        let id = ready_job(&db).await;
        finalize(&db, id, &Finalization::failed(None, "post rejected"))
            .await
            .unwrap();

        assert_eq!(
            jobs::enqueue(&db, &mention()).await.unwrap(),
            EnqueueOutcome::AlreadyExists
        );
        let counts = jobs::queue_counts(&db).await.unwrap();
        assert_eq!(counts.queued, 0);
        assert_eq!(counts.archived_failed, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failed_finalize_rolls_back() {
        let (db, _dir) = setup_db().await;
        let id = ready_job(&db).await;

        // history only accepts terminal statuses, so the insert is rejected
        let bogus = Finalization {
            reply: None,
            status: JobStatus::Ready,
            error: None,
        };
        assert!(finalize(&db, id, &bogus).await.is_err());

        let job = jobs::get_job(&db, id).await.unwrap().expect("row kept");
        assert_eq!(job.status, JobStatus::Ready);
        assert!(history_for(&db, &mention().message_uri).await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn finalize_unknown_job_errors() {
        let (db, _dir) = setup_db().await;
        assert!(
            finalize(&db, 404, &Finalization::failed(None, "x"))
                .await
                .is_err()
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn partial_thread_keeps_first_post_and_error() {
        let (db, _dir) = setup_db().await;
        let id = ready_job(&db).await;
        let first = PostRef {
            uri: "at://did:plc:bot/app.bsky.feed.post/first".into(),
            cid: "bafyfirst".into(),
        };
        finalize(&db, id, &Finalization::failed(Some(first), "second post failed"))
            .await
            .unwrap();

        let record = &history_for(&db, &mention().message_uri).await.unwrap()[0];
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.reply_cid.as_deref(), Some("bafyfirst"));
        assert_eq!(record.error_message.as_deref(), Some("second post failed"));
        db.close().await.unwrap();
    }
}
