// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `replybot serve` command implementation.
//!
//! Opens SQLite storage, restores limiter state, verifies the Bluesky
//! credentials, then runs the pipeline until a shutdown signal arrives.

use std::sync::Arc;

use replybot_bluesky::BlueskyFeed;
use replybot_config::{ReplybotConfig, render_errors, validate_credentials};
use replybot_core::error::ReplybotError;
use replybot_core::{FeedAdapter, PluginAdapter, StorageAdapter};
use replybot_gemini::GeminiProvider;
use replybot_limiter::RateLimiter;
use replybot_pipeline::{Pipeline, PipelineComponents, shutdown};
use replybot_storage::SqliteStorage;
use tracing::{error, info, warn};

/// Runs the `replybot serve` command.
///
/// Any error returned here happens before the pipeline starts and maps to
/// exit code 1.
pub async fn run_serve(config: ReplybotConfig) -> Result<(), ReplybotError> {
    init_tracing(&config.agent.log_level);
    info!(name = %config.agent.name, "starting replybot serve");

    if let Err(errors) = validate_credentials(&config) {
        render_errors(&errors);
        return Err(ReplybotError::Config(format!(
            "{} credential(s) missing",
            errors.len()
        )));
    }

    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;

    let limiter = Arc::new(RateLimiter::new(&config.limiter, storage.clone())?);
    limiter.load().await;

    let feed = Arc::new(BlueskyFeed::new(&config.bluesky)?);
    let provider = Arc::new(GeminiProvider::new(&config.gemini)?);

    let session = feed.authenticate().await.inspect_err(|e| {
        error!(error = %e, "initial Bluesky authentication failed");
    })?;
    info!(did = %session.did, handle = %session.handle, "authenticated with Bluesky");

    let components = PipelineComponents::from_config(
        &config,
        feed.clone(),
        provider.clone(),
        storage.clone(),
        limiter,
    )?;

    let shutdown_token = shutdown::install_signal_handler();
    let pipeline = Pipeline::start(components, &config.schedule);
    info!("replybot running, press Ctrl+C to stop");

    shutdown_token.cancelled().await;

    let drained = pipeline.shutdown(config.schedule.shutdown_grace()).await;
    if !drained {
        warn!("forced shutdown; the reaper will requeue interrupted jobs on next start");
    }

    if let Err(e) = feed.shutdown().await {
        warn!(error = %e, "feed shutdown failed");
    }
    if let Err(e) = provider.shutdown().await {
        warn!(error = %e, "provider shutdown failed");
    }
    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage close failed");
    }

    info!("replybot stopped");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("replybot={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
