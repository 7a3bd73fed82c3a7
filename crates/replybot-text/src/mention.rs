// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extracts the question from a mention.

/// Words dropped when they open the mention right before the handle.
const GREETINGS: &[&str] = &["hey", "hi", "hello", "yo", "ok", "okay"];

/// Whether `text` mentions `handle` anywhere, ignoring case.
pub fn mentions_handle(text: &str, handle: &str) -> bool {
    !handle.is_empty() && text.to_lowercase().contains(&handle.to_lowercase())
}

/// Remove every mention of `handle` from `text`.
///
/// A greeting that opens the text directly before the handle goes too
/// (`"hey @bot explain recursion"` becomes `"explain recursion"`), and runs
/// of whitespace collapse to single spaces. An empty result means there was
/// nothing to answer.
pub fn clean_mention_text(text: &str, handle: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut first_word_is_greeting = false;

    for (index, word) in text.split_whitespace().enumerate() {
        if is_handle(word, handle) {
            if index == 1 && first_word_is_greeting {
                kept.clear();
            }
            continue;
        }
        if index == 0 {
            first_word_is_greeting = is_greeting(word);
        }
        kept.push(word);
    }

    kept.join(" ")
}

fn is_handle(word: &str, handle: &str) -> bool {
    let word = word.trim_end_matches(|c: char| matches!(c, ',' | ':' | '!' | '?' | '.' | ';'));
    word.eq_ignore_ascii_case(handle)
}

fn is_greeting(word: &str) -> bool {
    let word = word.trim_end_matches([',', '!']);
    GREETINGS.iter().any(|g| word.eq_ignore_ascii_case(g))
}
