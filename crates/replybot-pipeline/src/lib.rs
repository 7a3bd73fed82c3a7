// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reply pipeline.
//!
//! Four independently ticking loops share only the job store and the rate
//! limiter:
//!
//! - [`Ingestor`] turns unread mentions into queued jobs
//! - [`ResponseWorker`] claims a job and generates its response
//! - [`ReplyDispatcher`] posts ready responses as reply threads
//! - [`StaleJobReaper`] requeues jobs stuck in `processing`
//!
//! [`Pipeline`] starts them and coordinates shutdown.

pub mod dispatcher;
pub mod ingestor;
pub mod pipeline;
pub mod reaper;
mod schedule;
pub mod shutdown;
pub mod worker;

pub use dispatcher::{DispatchReport, ReplyDispatcher};
pub use ingestor::{IngestReport, Ingestor};
pub use pipeline::{Pipeline, PipelineComponents};
pub use reaper::StaleJobReaper;
pub use worker::{FALLBACK_RESPONSE, Generated, ResponseWorker, WorkOutcome, build_prompt, estimate_tokens};
