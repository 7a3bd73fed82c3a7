// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text handling for replies and mentions.
//!
//! Post budgets are measured in extended grapheme clusters, so an emoji
//! with modifiers or a letter with combining marks counts as one unit and
//! is never cut in half.

pub mod chunker;
pub mod compose;
pub mod mention;

pub use chunker::{MIN_SPLIT_UNITS, add_continuation_markers, count_units, split_text};
pub use compose::{attribution_suffix, compose_reply};
pub use mention::{clean_mention_text, mentions_handle};
