// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and response bodies for the `generateContent` endpoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
}

impl GenerateContentRequest {
    /// A single user turn, optionally with search grounding and code execution.
    pub fn from_prompt(prompt: &str, grounding: bool) -> Self {
        let tools = grounding.then(|| {
            vec![
                Tool {
                    google_search: Some(EmptyObject {}),
                    code_execution: None,
                },
                Tool {
                    google_search: None,
                    code_execution: Some(EmptyObject {}),
                },
            ]
        });
        Self {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            tools,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Only text parts are read; other part kinds deserialize with `text: None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search: Option<EmptyObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_execution: Option<EmptyObject>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmptyObject {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    pub fn first_candidate_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    pub total_token_count: Option<u64>,
}

/// Error envelope returned by Google APIs.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grounding_adds_search_and_code_tools() {
        let json = serde_json::to_value(GenerateContentRequest::from_prompt("hi", true)).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["tools"][0], serde_json::json!({"google_search": {}}));
        assert_eq!(json["tools"][1], serde_json::json!({"code_execution": {}}));

        let plain = serde_json::to_value(GenerateContentRequest::from_prompt("hi", false)).unwrap();
        assert!(plain.get("tools").is_none());
    }

    #[test]
    fn concatenates_text_parts_of_first_candidate() {
        let resp: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                {"content": {"role": "model", "parts": [
                    {"text": "Recursion is "},
                    {"executableCode": {"language": "PYTHON", "code": "print(1)"}},
                    {"text": "a function calling itself."}
                ]}, "finishReason": "STOP"},
                {"content": {"parts": [{"text": "ignored"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 10, "totalTokenCount": 42}
        }))
        .unwrap();
        assert_eq!(resp.first_candidate_text(), "Recursion is a function calling itself.");
        assert_eq!(resp.usage_metadata.unwrap().total_token_count, Some(42));
    }

    #[test]
    fn missing_candidates_yield_empty_text() {
        let resp: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({"promptFeedback": {}})).unwrap();
        assert_eq!(resp.first_candidate_text(), "");
    }
}
