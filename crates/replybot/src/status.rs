// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `replybot status` command implementation.
//!
//! Reads queue sizes and persisted quota straight from the database, so it
//! works whether or not a `serve` process is running.

use std::io::IsTerminal;
use std::sync::Arc;

use replybot_config::ReplybotConfig;
use replybot_core::error::ReplybotError;
use replybot_core::types::QueueCounts;
use replybot_core::{JobStore, StorageAdapter};
use replybot_limiter::{LimiterSnapshot, ModelUsage, RateLimiter};
use replybot_storage::SqliteStorage;
use serde::Serialize;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database_path: String,
    pub queue: QueueCounts,
    pub limiter: LimiterSnapshot,
}

/// Run the `replybot status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(
    config: &ReplybotConfig,
    json: bool,
    plain: bool,
) -> Result<(), ReplybotError> {
    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let queue = storage.queue_counts().await?;
    let limiter = RateLimiter::new(&config.limiter, storage.clone())?;
    limiter.load().await;
    let snapshot = limiter.snapshot().await;
    storage.close().await?;

    let status = StatusResponse {
        database_path: config.storage.database_path.clone(),
        queue,
        limiter: snapshot,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print!("{}", render_status(&status, use_color));
    }
    Ok(())
}

/// Render the human-readable status table.
fn render_status(status: &StatusResponse, use_color: bool) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str("  replybot status\n");
    out.push_str(&format!("  {}\n", "-".repeat(35)));
    out.push_str(&format!("    Database:  {}\n", status.database_path));

    let q = &status.queue;
    out.push_str(&format!(
        "    Queue:     {} queued, {} processing, {} ready\n",
        q.queued, q.processing, q.ready
    ));
    out.push_str(&format!(
        "    History:   {} completed, {} failed\n",
        q.archived_completed, q.archived_failed
    ));

    out.push('\n');
    out.push_str(&format!("  Models ({})\n", status.limiter.timezone));
    for usage in &status.limiter.models {
        out.push_str(&format!(
            "    {:<24} {}\n",
            usage.model.as_str(),
            model_line(usage, use_color)
        ));
    }
    for grounding in &status.limiter.grounding {
        out.push_str(&format!(
            "    {:<24} {}/{} today\n",
            grounding.feature.to_string(),
            grounding.used_today,
            grounding.daily_cap
        ));
    }
    out.push('\n');
    out
}

fn model_line(usage: &ModelUsage, use_color: bool) -> String {
    let counts = format!(
        "{}/{} rpm, {}/{} rpd, {} tokens",
        usage.requests_this_minute, usage.rpm, usage.requests_today, usage.rpd, usage.tokens_today
    );
    let state = match usage.cooldown_until {
        Some(until) => format!("cooling down until {}", until.format("%Y-%m-%d %H:%M UTC")),
        None => "available".to_string(),
    };

    if use_color {
        use colored::Colorize;
        if usage.cooldown_until.is_some() {
            format!("{} {counts} ({})", "✗".red(), state.red())
        } else {
            format!("{} {counts} ({})", "✓".green(), state.green())
        }
    } else if usage.cooldown_until.is_some() {
        format!("[COOLDOWN] {counts} ({state})")
    } else {
        format!("[OK] {counts} ({state})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use replybot_core::types::GroundingFeature;
    use replybot_core::ModelId;
    use replybot_limiter::GroundingUsage;

    fn usage(model: ModelId, cooldown: bool) -> ModelUsage {
        ModelUsage {
            model,
            requests_this_minute: 2,
            rpm: 10,
            requests_today: 40,
            rpd: 250,
            tokens_today: 12_345,
            tokens_per_day: 250_000,
            consecutive_failures: if cooldown { 3 } else { 0 },
            cooldown_until: cooldown.then(|| Utc.with_ymd_and_hms(2026, 3, 11, 7, 0, 0).unwrap()),
        }
    }

    fn sample() -> StatusResponse {
        StatusResponse {
            database_path: "/tmp/replybot.db".into(),
            queue: QueueCounts {
                queued: 3,
                processing: 1,
                ready: 2,
                archived_completed: 10,
                archived_failed: 1,
            },
            limiter: LimiterSnapshot {
                timezone: "America/Los_Angeles".into(),
                models: vec![usage(ModelId::Flash, false), usage(ModelId::FlashLite, true)],
                grounding: vec![GroundingUsage {
                    feature: GroundingFeature::GoogleSearch,
                    used_today: 7,
                    daily_cap: 500,
                }],
            },
        }
    }

    #[test]
    fn plain_output_lists_queue_and_models() {
        let text = render_status(&sample(), false);
        assert!(text.contains("3 queued, 1 processing, 2 ready"));
        assert!(text.contains("10 completed, 1 failed"));
        assert!(text.contains("Models (America/Los_Angeles)"));
        assert!(text.contains("[OK] 2/10 rpm, 40/250 rpd, 12345 tokens (available)"));
        assert!(text.contains("[COOLDOWN]"));
        assert!(text.contains("cooling down until 2026-03-11 07:00 UTC"));
        assert!(text.contains("google_search"));
        assert!(text.contains("7/500 today"));
    }

    #[test]
    fn json_uses_provider_model_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["queue"]["ready"], 2);
        assert_eq!(json["limiter"]["models"][0]["model"], "gemini-2.5-flash");
        assert_eq!(json["limiter"]["models"][1]["model"], "gemini-2.5-flash-lite");
        assert!(json["limiter"]["models"][0]["cooldown_until"].is_null());
        assert_eq!(json["limiter"]["grounding"][0]["feature"], "google_search");
    }

    #[tokio::test]
    async fn status_reads_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ReplybotConfig::default();
        config.storage.database_path = dir.path().join("status.db").display().to_string();
        run_status(&config, true, true).await.unwrap();
    }
}
