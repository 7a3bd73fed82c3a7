// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Feed,
    Provider,
    Storage,
}

// --- Models and quota ---

/// The closed set of language model variants the pipeline may call.
///
/// The string form is the provider's model identifier and is also the key
/// under which quota state is persisted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum ModelId {
    #[strum(serialize = "gemini-2.5-flash")]
    #[serde(rename = "gemini-2.5-flash")]
    Flash,
    #[strum(serialize = "gemini-2.5-flash-lite")]
    #[serde(rename = "gemini-2.5-flash-lite")]
    FlashLite,
}

impl ModelId {
    /// Provider-side identifier, e.g. `gemini-2.5-flash`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Flash => "gemini-2.5-flash",
            ModelId::FlashLite => "gemini-2.5-flash-lite",
        }
    }
}

/// Grounding features that share a daily quota across all models.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GroundingFeature {
    GoogleSearch,
}

/// Persisted quota counters for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelQuotaRecord {
    pub model: ModelId,
    pub requests_this_minute: u32,
    pub requests_today: u32,
    pub tokens_today: u64,
    pub last_minute_reset: DateTime<Utc>,
    pub last_day_reset: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub cooldown_until_midnight: bool,
}

/// Persisted daily counter for one grounding feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingQuotaRecord {
    pub feature: GroundingFeature,
    pub used_today: u32,
    pub last_day_reset: DateTime<Utc>,
}

// --- Jobs ---

/// Lifecycle status of a job in the active queue or in history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Ready,
    Completed,
    Failed,
}

/// A de-duplicated mention about to enter the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub message_uri: String,
    pub message_cid: String,
    pub author_did: String,
    pub author_handle: String,
    pub content: String,
}

/// One row of the active job queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: i64,
    pub message_uri: String,
    pub message_cid: String,
    pub author_did: String,
    pub author_handle: String,
    pub content: String,
    pub status: JobStatus,
    pub response: Option<String>,
    pub model_name: Option<String>,
    pub used_grounding: Option<bool>,
    pub retry_count: u32,
    pub error_message: Option<String>,
    /// ISO 8601 timestamp.
    pub received_at: String,
    pub processing_started_at: Option<String>,
}

impl Job {
    /// Reference to the mention this job answers.
    pub fn mention_ref(&self) -> PostRef {
        PostRef {
            uri: self.message_uri.clone(),
            cid: self.message_cid.clone(),
        }
    }
}

/// Append-only archive record written when a job is finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub id: i64,
    pub job_id: i64,
    pub message_uri: String,
    pub message_cid: String,
    pub author_did: String,
    pub author_handle: String,
    pub content: String,
    pub response: Option<String>,
    pub model_name: Option<String>,
    pub used_grounding: Option<bool>,
    pub reply_uri: Option<String>,
    pub reply_cid: Option<String>,
    pub status: JobStatus,
    pub retry_count: u32,
    pub error_message: Option<String>,
    pub received_at: String,
    pub processing_started_at: Option<String>,
    pub finalized_at: String,
}

/// Result of inserting a mention into the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new row was created with this id.
    Inserted(i64),
    /// The identity is already queued or archived; nothing was written.
    AlreadyExists,
}

/// Result of recording a generation failure against a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The job went back to `queued` for another attempt.
    Requeued { retry_count: u32 },
    /// Retries are used up; the fallback response was installed and the job is `ready`.
    Exhausted { retry_count: u32 },
}

/// Outcome of a dispatch attempt, written to history on finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalization {
    /// First post of the reply thread, if any post was created.
    pub reply: Option<PostRef>,
    /// `Completed` or `Failed`.
    pub status: JobStatus,
    pub error: Option<String>,
}

impl Finalization {
    pub fn completed(reply: PostRef) -> Self {
        Self {
            reply: Some(reply),
            status: JobStatus::Completed,
            error: None,
        }
    }

    pub fn failed(reply: Option<PostRef>, error: impl Into<String>) -> Self {
        Self {
            reply,
            status: JobStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// Number of active jobs per status plus the history size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub queued: u64,
    pub processing: u64,
    pub ready: u64,
    pub archived_completed: u64,
    pub archived_failed: u64,
}

// --- Feed ---

/// Strong reference to a post on the feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

/// Authenticated session with the feed service.
#[derive(Debug, Clone)]
pub struct FeedSession {
    /// Account identifier that owns created records.
    pub did: String,
    pub handle: String,
    pub access_token: String,
}

/// A mention notification as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub uri: String,
    pub cid: String,
    pub author_did: String,
    pub author_handle: String,
    /// Post text; empty when the record is not a post.
    pub text: String,
    pub is_read: bool,
}

/// One page of mention notifications.
#[derive(Debug, Clone, Default)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub cursor: Option<String>,
}

// --- Provider ---

/// A single-shot generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: ModelId,
    pub prompt: String,
    pub enable_search_grounding: bool,
}

/// The text of the first candidate plus reported token usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResponse {
    pub text: String,
    /// Total tokens reported by the provider, if it reported any.
    pub tokens_used: Option<u64>,
}
