// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so typos are rejected at
//! startup instead of silently falling back to defaults.

use std::time::Duration;

use replybot_core::ModelId;
use serde::{Deserialize, Serialize};

/// Top-level replybot configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReplybotConfig {
    /// Bot identity and generation behaviour.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Bluesky account and polling settings.
    #[serde(default)]
    pub bluesky: BlueskyConfig,

    /// Gemini API settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// SQLite settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-model quota limits.
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Loop intervals and timeouts.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Reply posting settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Bot identity and generation behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name used in logs.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Handle that mentions must contain, e.g. `@replybot.bsky.social`.
    #[serde(default)]
    pub bot_handle: Option<String>,

    /// Generation attempts before the fallback response is used.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Models to try, in order.
    #[serde(default = "default_models")]
    pub models: Vec<ModelId>,

    /// Allow search grounding when its daily quota permits.
    #[serde(default = "default_true")]
    pub enable_grounding: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            bot_handle: None,
            max_retries: default_max_retries(),
            models: default_models(),
            enable_grounding: true,
        }
    }
}

impl AgentConfig {
    /// The configured handle normalized to start with `@`.
    pub fn mention_handle(&self) -> Option<String> {
        self.bot_handle
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|h| {
                if h.starts_with('@') {
                    h.to_string()
                } else {
                    format!("@{h}")
                }
            })
    }
}

fn default_agent_name() -> String {
    "replybot".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_models() -> Vec<ModelId> {
    vec![ModelId::Flash, ModelId::FlashLite]
}

fn default_true() -> bool {
    true
}

/// Bluesky account and polling settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BlueskyConfig {
    /// PDS base URL.
    #[serde(default = "default_bluesky_host")]
    pub host: String,

    /// Login identifier (handle or DID). Required by `serve`.
    #[serde(default)]
    pub identifier: Option<String>,

    /// App password. Required by `serve`.
    #[serde(default)]
    pub app_password: Option<String>,

    /// Notifications requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            host: default_bluesky_host(),
            identifier: None,
            app_password: None,
            page_size: default_page_size(),
        }
    }
}

fn default_bluesky_host() -> String {
    "https://bsky.social".to_string()
}

fn default_page_size() -> u32 {
    10
}

/// Gemini API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiConfig {
    /// API key. Required by `serve`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// REST endpoint root.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_gemini_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_base_url(),
            timeout_secs: default_gemini_timeout_secs(),
        }
    }
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_timeout_secs() -> u64 {
    60
}

/// SQLite settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journaling.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("replybot").join("replybot.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("replybot.db"))
        .to_string_lossy()
        .into_owned()
}

/// Static limits for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelLimitsConfig {
    /// Requests per minute.
    pub rpm: u32,
    /// Requests per day.
    pub rpd: u32,
    /// Tokens per day.
    pub tokens_per_day: u64,
}

/// Per-model quota limits and cooldown policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimiterConfig {
    /// IANA timezone whose midnight starts a new quota day.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Quota-like failures in a row before a model is benched until midnight.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Shared daily cap for search grounding across all models.
    #[serde(default = "default_grounding_daily_cap")]
    pub grounding_daily_cap: u32,

    #[serde(default = "default_flash_limits")]
    pub flash: ModelLimitsConfig,

    #[serde(default = "default_flash_lite_limits")]
    pub flash_lite: ModelLimitsConfig,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            max_consecutive_failures: default_max_consecutive_failures(),
            grounding_daily_cap: default_grounding_daily_cap(),
            flash: default_flash_limits(),
            flash_lite: default_flash_lite_limits(),
        }
    }
}

impl LimiterConfig {
    /// Static limits for `model`.
    pub fn limits_for(&self, model: ModelId) -> ModelLimitsConfig {
        match model {
            ModelId::Flash => self.flash,
            ModelId::FlashLite => self.flash_lite,
        }
    }
}

fn default_timezone() -> String {
    "America/Los_Angeles".to_string()
}

fn default_max_consecutive_failures() -> u32 {
    3
}

fn default_grounding_daily_cap() -> u32 {
    500
}

fn default_flash_limits() -> ModelLimitsConfig {
    ModelLimitsConfig {
        rpm: 10,
        rpd: 250,
        tokens_per_day: 250_000,
    }
}

fn default_flash_lite_limits() -> ModelLimitsConfig {
    ModelLimitsConfig {
        rpm: 15,
        rpd: 1000,
        tokens_per_day: 250_000,
    }
}

/// Loop intervals and timeouts, in seconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    #[serde(default = "default_ingest_interval_secs")]
    pub ingest_interval_secs: u64,

    #[serde(default = "default_worker_interval_secs")]
    pub worker_interval_secs: u64,

    #[serde(default = "default_dispatch_interval_secs")]
    pub dispatch_interval_secs: u64,

    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,

    /// A `processing` job older than this is returned to the queue.
    #[serde(default = "default_stale_timeout_secs")]
    pub stale_timeout_secs: u64,

    /// How long in-flight ticks may run after shutdown is requested.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            ingest_interval_secs: default_ingest_interval_secs(),
            worker_interval_secs: default_worker_interval_secs(),
            dispatch_interval_secs: default_dispatch_interval_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
            stale_timeout_secs: default_stale_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn ingest_interval(&self) -> Duration {
        Duration::from_secs(self.ingest_interval_secs)
    }

    pub fn worker_interval(&self) -> Duration {
        Duration::from_secs(self.worker_interval_secs)
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_secs(self.dispatch_interval_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn default_ingest_interval_secs() -> u64 {
    60
}

fn default_worker_interval_secs() -> u64 {
    5
}

fn default_dispatch_interval_secs() -> u64 {
    10
}

fn default_reaper_interval_secs() -> u64 {
    300
}

fn default_stale_timeout_secs() -> u64 {
    600
}

fn default_shutdown_grace_secs() -> u64 {
    120
}

/// Reply posting settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Hard size of one post, in graphemes.
    #[serde(default = "default_post_budget")]
    pub post_budget: usize,

    /// Size each thread chunk is split to, leaving room for markers.
    #[serde(default = "default_thread_budget")]
    pub thread_budget: usize,

    /// Ready jobs fetched per dispatch tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Append the model name to replies when it fits.
    #[serde(default = "default_true")]
    pub attribution: bool,

    /// Pause between replies within one tick, in milliseconds.
    #[serde(default = "default_inter_job_delay_ms")]
    pub inter_job_delay_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            post_budget: default_post_budget(),
            thread_budget: default_thread_budget(),
            batch_size: default_batch_size(),
            attribution: true,
            inter_job_delay_ms: default_inter_job_delay_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn inter_job_delay(&self) -> Duration {
        Duration::from_millis(self.inter_job_delay_ms)
    }
}

fn default_post_budget() -> usize {
    300
}

fn default_thread_budget() -> usize {
    280
}

fn default_batch_size() -> u32 {
    10
}

fn default_inter_job_delay_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mention_handle_adds_at_sign() {
        let mut agent = AgentConfig {
            bot_handle: Some("bot.bsky.social".into()),
            ..AgentConfig::default()
        };
        assert_eq!(agent.mention_handle().as_deref(), Some("@bot.bsky.social"));

        agent.bot_handle = Some("@bot".into());
        assert_eq!(agent.mention_handle().as_deref(), Some("@bot"));

        agent.bot_handle = Some("   ".into());
        assert_eq!(agent.mention_handle(), None);
    }

    #[test]
    fn limits_for_picks_model_section() {
        let limiter = LimiterConfig::default();
        assert_eq!(limiter.limits_for(ModelId::Flash).rpm, 10);
        assert_eq!(limiter.limits_for(ModelId::FlashLite).rpd, 1000);
    }

    #[test]
    fn schedule_durations() {
        let schedule = ScheduleConfig::default();
        assert_eq!(schedule.stale_timeout(), Duration::from_secs(600));
        assert_eq!(schedule.shutdown_grace(), Duration::from_secs(120));
    }
}
