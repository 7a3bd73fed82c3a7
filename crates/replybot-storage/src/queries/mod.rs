// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed queries over the job queue, its history, and quota state.

pub mod history;
pub mod jobs;
pub mod quota;

use std::str::FromStr;

use rusqlite::types::Type;

/// Parse a text column into a strum enum, surfacing bad values as conversion errors.
pub(crate) fn parse_column<T>(index: usize, value: String) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}
