// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./replybot.toml` > `~/.config/replybot/replybot.toml` >
//! `/etc/replybot/replybot.toml`, with `REPLYBOT_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ReplybotConfig;

/// Top-level sections, used to turn `REPLYBOT_SECTION_KEY` into `section.key`.
const SECTIONS: &[&str] = &[
    "agent", "bluesky", "gemini", "storage", "limiter", "schedule", "dispatch",
];

/// Nested tables under `[limiter]`, longest first so `flash_lite` wins over `flash`.
const LIMITER_TABLES: &[&str] = &["flash_lite", "flash"];

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/replybot/replybot.toml`
/// 3. `~/.config/replybot/replybot.toml`
/// 4. `./replybot.toml`
/// 5. `REPLYBOT_*` environment variables
pub fn load_config() -> Result<ReplybotConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ReplybotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ReplybotConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ReplybotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ReplybotConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ReplybotConfig::default()))
        .merge(Toml::file("/etc/replybot/replybot.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("replybot/replybot.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("replybot.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys contain
/// underscores: `REPLYBOT_BLUESKY_APP_PASSWORD` must become
/// `bluesky.app_password`, and `REPLYBOT_LIMITER_FLASH_LITE_RPM` must become
/// `limiter.flash_lite.rpm`.
fn env_provider() -> Env {
    Env::prefixed("REPLYBOT_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        else {
            continue;
        };

        if *section == "limiter" {
            for table in LIMITER_TABLES {
                if let Some(field) = rest.strip_prefix(table).and_then(|r| r.strip_prefix('_')) {
                    return format!("limiter.{table}.{field}");
                }
            }
        }
        return format!("{section}.{rest}");
    }
    key.to_string()
}
