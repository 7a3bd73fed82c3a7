// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admission control for language model calls.
//!
//! Tracks per-model request and token usage against configured limits,
//! a shared daily counter for search grounding, and a cooldown that benches
//! a model until local midnight after repeated quota errors. State is
//! written through a [`QuotaStore`](replybot_core::QuotaStore) on every
//! change so restarts never hand out quota early.

pub mod classify;
pub mod clock;
pub mod limiter;
pub mod window;

pub use classify::is_quota_error;
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{Admission, GroundingUsage, LimiterSnapshot, ModelUsage, RateLimiter};
