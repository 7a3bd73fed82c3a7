// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Splits text into numbered chunks that each fit a grapheme budget.

use unicode_segmentation::UnicodeSegmentation;

/// A boundary counts only if it lies at least this far into the chunk, in tenths.
const MIN_BOUNDARY_TENTHS: usize = 7;

/// Smallest `max_units` [`split_text`] accepts for text that needs splitting.
pub const MIN_SPLIT_UNITS: usize = 20;

/// Number of user-perceived characters in `text`.
pub fn count_units(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Split `text` into chunks of at most `max_units` graphemes, markers included.
///
/// Text that already fits comes back as a single trimmed chunk with no
/// marker. Longer text is filled greedily, breaking at the last whitespace
/// or punctuation when that keeps the chunk at least 70% full, and the
/// result carries ` (1/N)` / `…(i/N) ` markers.
///
/// Room for the markers is reserved from their real length for the
/// predicted chunk count. When the split needs more digits than predicted
/// (10 or more chunks when 2 were assumed), it is redone with the wider
/// reservation.
///
/// Text that does not fit requires `max_units >= MIN_SPLIT_UNITS`; below
/// that the markers alone can exceed the budget. Release builds still make
/// progress one grapheme per chunk, debug builds panic.
pub fn split_text(text: &str, max_units: usize) -> Vec<String> {
    let text = text.trim();
    if count_units(text) <= max_units {
        return vec![text.to_string()];
    }
    debug_assert!(
        max_units >= MIN_SPLIT_UNITS,
        "split budget {max_units} is below {MIN_SPLIT_UNITS}"
    );

    let graphemes: Vec<&str> = text.graphemes(true).collect();
    let mut predicted = 2;
    loop {
        let chunks = fill_chunks(&graphemes, max_units, predicted);
        if digits(chunks.len()) <= digits(predicted) {
            return add_continuation_markers(chunks);
        }
        predicted = chunks.len();
    }
}

/// Number chunks as a thread: ` (1/N)` after the first, `…(i/N) ` before the rest.
pub fn add_continuation_markers(chunks: Vec<String>) -> Vec<String> {
    let total = chunks.len();
    if total <= 1 {
        return chunks;
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            if i == 0 {
                format!("{chunk} (1/{total})")
            } else {
                format!("…({}/{total}) {chunk}", i + 1)
            }
        })
        .collect()
}

/// Graphemes in the ` (1/N)` suffix.
fn first_marker_units(total: usize) -> usize {
    5 + digits(total)
}

/// Upper bound on graphemes in the `…(i/N) ` prefix for any `i <= N`.
fn later_marker_units(total: usize) -> usize {
    5 + 2 * digits(total)
}

fn digits(n: usize) -> usize {
    n.max(1).ilog10() as usize + 1
}

fn fill_chunks(graphemes: &[&str], max_units: usize, predicted: usize) -> Vec<String> {
    let first_budget = max_units.saturating_sub(first_marker_units(predicted)).max(1);
    let later_budget = max_units.saturating_sub(later_marker_units(predicted)).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < graphemes.len() {
        while start < graphemes.len() && is_space(graphemes[start]) {
            start += 1;
        }
        if start == graphemes.len() {
            break;
        }

        let budget = if chunks.is_empty() {
            first_budget
        } else {
            later_budget
        };

        let end = if graphemes.len() - start <= budget {
            graphemes.len()
        } else {
            break_point(graphemes, start, budget)
        };

        let chunk = graphemes[start..end].concat();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        start = end;
    }
    chunks
}

/// Exclusive end of the chunk starting at `start`. Always past `start`.
fn break_point(graphemes: &[&str], start: usize, budget: usize) -> usize {
    let hard_end = start + budget;
    for end in (start + 1..=hard_end).rev() {
        if (end - start) * 10 < budget * MIN_BOUNDARY_TENTHS {
            break;
        }
        let before = graphemes[end - 1];
        let at = graphemes.get(end).copied();
        if is_space(before) || is_punctuation(before) || at.is_some_and(is_space) {
            return end;
        }
    }
    hard_end
}

fn is_space(grapheme: &str) -> bool {
    grapheme.chars().all(char::is_whitespace)
}

fn is_punctuation(grapheme: &str) -> bool {
    grapheme.chars().all(|c| {
        c.is_ascii_punctuation()
            || matches!(c, '…' | '—' | '–' | '。' | '、' | '！' | '？' | '，' | '；' | '：')
    })
}
