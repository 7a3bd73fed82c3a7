// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! Every statement runs on tokio-rusqlite's single background thread, so one
//! [`Database`] is one writer. Atomicity across processes sharing the file
//! comes from single-statement updates and transactions, not from this type.

use std::path::Path;

use chrono::{DateTime, Utc};
use replybot_core::ReplybotError;
use tracing::debug;

use crate::migrations::run_migrations;

/// Timestamp layout shared with `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode and run migrations.
    pub async fn open(path: &str) -> Result<Self, ReplybotError> {
        Self::open_with(path, true).await
    }

    /// Open the database, choosing the journal mode explicitly.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, ReplybotError> {
        if path != ":memory:"
            && let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ReplybotError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| ReplybotError::storage(format!("cannot open database {path}: {e}")))?;

        let journal = if wal_mode { "WAL" } else { "DELETE" };
        conn.call(move |conn| -> Result<(), ReplybotError> {
            conn.execute_batch(&format!(
                "PRAGMA journal_mode = {journal};
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;
                 PRAGMA foreign_keys = ON;"
            ))
            .map_err(|e| ReplybotError::Storage {
                source: Box::new(e),
            })?;
            run_migrations(conn)
        })
        .await
        .map_err(|e| match e {
            tokio_rusqlite::Error::Error(inner) => inner,
            other => ReplybotError::storage(other.to_string()),
        })?;

        debug!(path, journal, "database opened");
        Ok(Self { conn })
    }

    /// The underlying async connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Close the connection, flushing the background thread.
    pub async fn close(self) -> Result<(), ReplybotError> {
        self.conn
            .close()
            .await
            .map_err(|e| ReplybotError::storage(e.to_string()))
    }
}

/// Convert a tokio-rusqlite error into the pipeline error type.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ReplybotError {
    match e {
        tokio_rusqlite::Error::Error(inner) => ReplybotError::Storage {
            source: Box::new(inner),
        },
        other => ReplybotError::storage(other.to_string()),
    }
}

/// Render `at` the way SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ')` does, so
/// stored timestamps compare correctly as text.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp written by [`format_timestamp`] or by SQLite.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
