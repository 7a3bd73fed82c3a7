// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! XRPC request and response bodies for the endpoints the bot uses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub access_jwt: String,
    pub did: String,
    pub handle: String,
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsResponse {
    #[serde(default)]
    pub notifications: Vec<ApiNotification>,
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNotification {
    pub uri: String,
    pub cid: String,
    pub author: ApiAuthor,
    pub reason: String,
    /// Arbitrary record; only `app.bsky.feed.post` carries `text`.
    #[serde(default)]
    pub record: serde_json::Value,
    #[serde(default)]
    pub is_read: bool,
}

impl ApiNotification {
    /// Post text, or empty when the record is not a post.
    pub fn post_text(&self) -> String {
        if self.record.get("$type").and_then(|t| t.as_str()) != Some(POST_COLLECTION) {
            return String::new();
        }
        self.record
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
pub struct ApiAuthor {
    pub did: String,
    pub handle: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSeenRequest {
    pub seen_at: String,
}

pub const POST_COLLECTION: &str = "app.bsky.feed.post";

#[derive(Debug, Serialize)]
pub struct CreateRecordRequest<'a> {
    pub repo: &'a str,
    pub collection: &'a str,
    pub record: PostRecord<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord<'a> {
    #[serde(rename = "$type")]
    pub type_: &'a str,
    pub text: &'a str,
    pub created_at: String,
    pub reply: ReplyRef<'a>,
}

#[derive(Debug, Serialize)]
pub struct ReplyRef<'a> {
    pub root: StrongRef<'a>,
    pub parent: StrongRef<'a>,
}

#[derive(Debug, Serialize)]
pub struct StrongRef<'a> {
    pub uri: &'a str,
    pub cid: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CreateRecordResponse {
    pub uri: String,
    pub cid: String,
}

/// Error body returned by XRPC endpoints.
#[derive(Debug, Deserialize)]
pub struct XrpcErrorResponse {
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
}
