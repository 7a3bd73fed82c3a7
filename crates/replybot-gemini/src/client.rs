// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Gemini `generateContent` API.
//!
//! Server-side transient errors (500, 503) are retried once. A 429 is
//! returned immediately so the rate limiter sees it.

use std::time::Duration;

use replybot_core::ReplybotError;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, GenerateContentRequest, GenerateContentResponse};

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl GeminiClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ReplybotError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key).map_err(|e| {
                ReplybotError::Config(format!("invalid API key header value: {e}"))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ReplybotError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Shortens the pause before a retry (for tests).
    #[cfg(test)]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ReplybotError> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(model, attempt, "retrying generation after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&url)
                .json(request)
                .send()
                .await
                .map_err(|e| ReplybotError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(model, status = %status, attempt, "generation response received");

            if status.is_success() {
                let body = response.text().await.map_err(|e| ReplybotError::Provider {
                    message: format!("failed to read response body: {e}"),
                    source: Some(Box::new(e)),
                })?;
                return serde_json::from_str(&body).map_err(|e| ReplybotError::Provider {
                    message: format!("failed to parse API response: {e}"),
                    source: Some(Box::new(e)),
                });
            }

            let body = response.text().await.unwrap_or_default();
            let error = ReplybotError::provider(error_message(status, &body));
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, "transient error, will retry");
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error.unwrap_or_else(|| {
            ReplybotError::provider("generation request failed after retries")
        }))
    }
}

fn is_transient_error(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// Keeps the status code and the API's status name in the message so quota
/// errors are recognizable downstream.
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api) if !api.error.status.is_empty() => format!(
            "API returned {status}: {} ({})",
            api.error.message, api.error.status
        ),
        Ok(api) => format!("API returned {status}: {}", api.error.message),
        Err(_) => format!("API returned {status}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_includes_api_status() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded for metric","status":"RESOURCE_EXHAUSTED"}}"#;
        let msg = error_message(StatusCode::TOO_MANY_REQUESTS, body);
        assert_eq!(
            msg,
            "API returned 429 Too Many Requests: Quota exceeded for metric (RESOURCE_EXHAUSTED)"
        );
    }

    #[test]
    fn error_message_falls_back_to_raw_body() {
        let msg = error_message(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(msg, "API returned 502 Bad Gateway: <html>bad gateway</html>");
    }

    #[test]
    fn only_server_errors_are_transient() {
        assert!(is_transient_error(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_error(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!is_transient_error(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient_error(StatusCode::BAD_REQUEST));
    }
}
