// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recognizes provider errors that mean "out of quota".

const QUOTA_MARKERS: &[&str] = &[
    "rate limit",
    "quota exceeded",
    "too many requests",
    "429",
    "resource exhausted",
    "resource_exhausted",
];

/// Whether an error message reports quota exhaustion rather than a fault.
pub fn is_quota_error(message: &str) -> bool {
    let message = message.to_lowercase();
    QUOTA_MARKERS.iter().any(|marker| message.contains(marker))
}
