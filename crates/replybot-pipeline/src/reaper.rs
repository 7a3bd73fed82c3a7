// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use replybot_core::{JobStore, ReplybotError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::schedule::ticker;

/// Returns jobs abandoned in `processing` to the queue.
pub struct StaleJobReaper {
    store: Arc<dyn JobStore>,
    timeout: Duration,
}

impl StaleJobReaper {
    pub fn new(store: Arc<dyn JobStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn run(self, period: Duration, cancel: CancellationToken) {
        info!(timeout_secs = self.timeout.as_secs(), "stale job reaper started");
        let mut ticker = ticker(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "reaper tick failed");
                    }
                }
            }
        }
        info!("stale job reaper stopped");
    }

    pub async fn run_once(&self) -> Result<Vec<i64>, ReplybotError> {
        let reset = self.store.reap_stale(self.timeout).await?;
        for job_id in &reset {
            warn!(job_id, "reset stale job");
        }
        if !reset.is_empty() {
            info!(count = reset.len(), "reset stale jobs");
        }
        Ok(reset)
    }
}
