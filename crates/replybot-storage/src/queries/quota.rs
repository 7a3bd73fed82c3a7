// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence for rate limiter counters.

use replybot_core::ReplybotError;
use replybot_core::types::{GroundingFeature, GroundingQuotaRecord, ModelId, ModelQuotaRecord};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, format_timestamp, map_tr_err, parse_timestamp};
use crate::queries::parse_column;

fn timestamp_column(index: usize, value: String) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    parse_timestamp(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Text,
            format!("invalid timestamp `{value}`").into(),
        )
    })
}

pub async fn load_model_quota(
    db: &Database,
    model: ModelId,
) -> Result<Option<ModelQuotaRecord>, ReplybotError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT model, requests_this_minute, requests_today, tokens_today,
                        last_minute_reset, last_day_reset, consecutive_failures,
                        cooldown_until_midnight
                 FROM model_quota WHERE model = ?1",
                params![model.as_str()],
                |row| {
                    let tokens_today: i64 = row.get(3)?;
                    Ok(ModelQuotaRecord {
                        model: parse_column(0, row.get(0)?)?,
                        requests_this_minute: row.get(1)?,
                        requests_today: row.get(2)?,
                        tokens_today: tokens_today.max(0) as u64,
                        last_minute_reset: timestamp_column(4, row.get(4)?)?,
                        last_day_reset: timestamp_column(5, row.get(5)?)?,
                        consecutive_failures: row.get(6)?,
                        cooldown_until_midnight: row.get(7)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn save_model_quota(db: &Database, record: &ModelQuotaRecord) -> Result<(), ReplybotError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO model_quota (
                     model, requests_this_minute, requests_today, tokens_today,
                     last_minute_reset, last_day_reset, consecutive_failures,
                     cooldown_until_midnight
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (model) DO UPDATE SET
                     requests_this_minute = excluded.requests_this_minute,
                     requests_today = excluded.requests_today,
                     tokens_today = excluded.tokens_today,
                     last_minute_reset = excluded.last_minute_reset,
                     last_day_reset = excluded.last_day_reset,
                     consecutive_failures = excluded.consecutive_failures,
                     cooldown_until_midnight = excluded.cooldown_until_midnight",
                params![
                    record.model.as_str(),
                    record.requests_this_minute,
                    record.requests_today,
                    i64::try_from(record.tokens_today).unwrap_or(i64::MAX),
                    format_timestamp(record.last_minute_reset),
                    format_timestamp(record.last_day_reset),
                    record.consecutive_failures,
                    record.cooldown_until_midnight,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn load_grounding_quota(
    db: &Database,
    feature: GroundingFeature,
) -> Result<Option<GroundingQuotaRecord>, ReplybotError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT feature, used_today, last_day_reset
                 FROM grounding_quota WHERE feature = ?1",
                params![feature.to_string()],
                |row| {
                    Ok(GroundingQuotaRecord {
                        feature: parse_column(0, row.get(0)?)?,
                        used_today: row.get(1)?,
                        last_day_reset: timestamp_column(2, row.get(2)?)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn save_grounding_quota(
    db: &Database,
    record: &GroundingQuotaRecord,
) -> Result<(), ReplybotError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO grounding_quota (feature, used_today, last_day_reset)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (feature) DO UPDATE SET
                     used_today = excluded.used_today,
                     last_day_reset = excluded.last_day_reset",
                params![
                    record.feature.to_string(),
                    record.used_today,
                    format_timestamp(record.last_day_reset),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn model_quota_upserts() {
        let (db, _dir) = setup_db().await;
        assert!(load_model_quota(&db, ModelId::Flash).await.unwrap().is_none());

        let mut record = ModelQuotaRecord {
            model: ModelId::Flash,
            requests_this_minute: 4,
            requests_today: 40,
            tokens_today: 12_345,
            last_minute_reset: Utc.with_ymd_and_hms(2026, 5, 1, 12, 30, 0).unwrap(),
            last_day_reset: Utc.with_ymd_and_hms(2026, 5, 1, 7, 0, 0).unwrap(),
            consecutive_failures: 2,
            cooldown_until_midnight: false,
        };
        save_model_quota(&db, &record).await.unwrap();
        assert_eq!(
            load_model_quota(&db, ModelId::Flash).await.unwrap(),
            Some(record.clone())
        );

        record.cooldown_until_midnight = true;
        record.consecutive_failures = 3;
        save_model_quota(&db, &record).await.unwrap();
        let loaded = load_model_quota(&db, ModelId::Flash).await.unwrap().unwrap();
        assert!(loaded.cooldown_until_midnight);
        assert_eq!(loaded.consecutive_failures, 3);

        // other models stay independent
        assert!(load_model_quota(&db, ModelId::FlashLite).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn grounding_quota_upserts() {
        let (db, _dir) = setup_db().await;
        let record = GroundingQuotaRecord {
            feature: GroundingFeature::GoogleSearch,
            used_today: 17,
            last_day_reset: Utc.with_ymd_and_hms(2026, 5, 1, 7, 0, 0).unwrap(),
        };
        save_grounding_quota(&db, &record).await.unwrap();
        save_grounding_quota(&db, &record).await.unwrap();
        assert_eq!(
            load_grounding_quota(&db, GroundingFeature::GoogleSearch)
                .await
                .unwrap(),
            Some(record)
        );
        db.close().await.unwrap();
    }
}
