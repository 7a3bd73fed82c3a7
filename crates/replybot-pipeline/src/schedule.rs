// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior, interval};

/// Interval whose missed ticks are pushed back instead of bursting.
pub(crate) fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
