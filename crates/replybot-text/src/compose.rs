// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns a generated response into the posts of a reply thread.

use crate::chunker::{count_units, split_text};

/// Attribution appended to replies, e.g. `"\n🤖 gemini-2.5-flash"`.
pub fn attribution_suffix(model_name: &str) -> String {
    format!("\n🤖 {model_name}")
}

/// Posts to send for `response`, in thread order.
///
/// One post when the response fits `post_budget`, with `suffix` if that
/// still fits. Otherwise the response is split at `thread_budget` and the
/// suffix rides on the last chunk only when the result stays within
/// `post_budget`.
pub fn compose_reply(
    response: &str,
    suffix: Option<&str>,
    post_budget: usize,
    thread_budget: usize,
) -> Vec<String> {
    let response = response.trim();

    if let Some(suffix) = suffix {
        let combined = format!("{response}{suffix}");
        if count_units(&combined) <= post_budget {
            return vec![combined];
        }
    }

    if count_units(response) <= post_budget {
        return vec![response.to_string()];
    }

    let mut chunks = split_text(response, thread_budget);
    if let Some(suffix) = suffix
        && let Some(last) = chunks.last_mut()
    {
        let candidate = format!("{last}{suffix}");
        if count_units(&candidate) <= post_budget {
            *last = candidate;
        }
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    const POST: usize = 300;
    const THREAD: usize = 280;

    #[test]
    fn short_reply_keeps_suffix() {
        let suffix = attribution_suffix("gemini-2.5-flash");
        let posts = compose_reply("Recursion is a function calling itself.", Some(&suffix), POST, THREAD);
        assert_eq!(
            posts,
            vec!["Recursion is a function calling itself.\n🤖 gemini-2.5-flash"]
        );
    }

    #[test]
    fn suffix_dropped_when_only_bare_response_fits() {
        let suffix = attribution_suffix("gemini-2.5-flash");
        let response = "r".repeat(295);
        let posts = compose_reply(&response, Some(&suffix), POST, THREAD);
        assert_eq!(posts, vec![response]);
    }

    #[test]
    fn long_reply_becomes_thread_with_suffix_on_last() {
        let suffix = attribution_suffix("gemini-2.5-flash-lite");
        let response = "sentence number one. ".repeat(20);
        let posts = compose_reply(&response, Some(&suffix), POST, THREAD);
        assert!(posts.len() >= 2);
        assert!(posts[0].ends_with(&format!(" (1/{})", posts.len())));
        assert!(posts.last().unwrap().ends_with("\n🤖 gemini-2.5-flash-lite"));
        for post in &posts[..posts.len() - 1] {
            assert!(!post.contains('🤖'));
            assert!(count_units(post) <= THREAD);
        }
        assert!(count_units(posts.last().unwrap()) <= POST);
    }

    #[test]
    fn suffix_skipped_when_last_chunk_is_full() {
        let suffix = attribution_suffix("gemini-2.5-flash");
        // 294 units before " (1/2)", then 293 after "…(2/2) ": both posts are full
        let response = "q".repeat(587);
        let posts = compose_reply(&response, Some(&suffix), 300, 300);
        assert_eq!(posts.len(), 2);
        assert_eq!(count_units(&posts[1]), 300);
        assert!(!posts[1].contains('🤖'));
    }

    #[test]
    fn no_suffix_three_hundred_ten_units() {
        let response = "a".repeat(310);
        let posts = compose_reply(&response, None, POST, THREAD);
        assert_eq!(posts.len(), 2);
        assert!(posts[0].ends_with("(1/2)"));
        assert!(posts[1].starts_with("…(2/2)"));
    }
}
