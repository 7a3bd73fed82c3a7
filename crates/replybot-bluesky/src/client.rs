// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Bluesky XRPC API.

use std::time::Duration;

use replybot_core::ReplybotError;
use reqwest::{Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::XrpcErrorResponse;

/// Upper bound on any single XRPC call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct XrpcClient {
    client: reqwest::Client,
    host: String,
}

impl XrpcClient {
    pub fn new(host: &str) -> Result<Self, ReplybotError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ReplybotError::Feed {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, method: &str, query: &[(&str, &str)]) -> Result<Url, ReplybotError> {
        let mut url = Url::parse(&format!("{}/xrpc/{method}", self.host))
            .map_err(|e| ReplybotError::Config(format!("invalid Bluesky host `{}`: {e}", self.host)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Call a query (GET) endpoint.
    pub async fn query<T: DeserializeOwned>(
        &self,
        method: &str,
        token: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ReplybotError> {
        let response = self
            .client
            .get(self.url(method, params)?)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error(method, e))?;
        decode(method, response).await
    }

    /// Call a procedure (POST) endpoint and decode its output.
    pub async fn procedure<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<T, ReplybotError> {
        let response = self.send_procedure(method, token, body).await?;
        decode(method, response).await
    }

    /// Call a procedure (POST) endpoint that returns no body.
    pub async fn procedure_no_output<B: Serialize + ?Sized>(
        &self,
        method: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<(), ReplybotError> {
        let response = self.send_procedure(method, token, body).await?;
        check_status(method, response).await.map(|_| ())
    }

    async fn send_procedure<B: Serialize + ?Sized>(
        &self,
        method: &str,
        token: Option<&str>,
        body: &B,
    ) -> Result<Response, ReplybotError> {
        let mut request = self.client.post(self.url(method, &[])?).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request
            .send()
            .await
            .map_err(|e| transport_error(method, e))
    }
}

fn transport_error(method: &str, e: reqwest::Error) -> ReplybotError {
    ReplybotError::Feed {
        message: format!("{method} request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

async fn check_status(method: &str, response: Response) -> Result<Response, ReplybotError> {
    let status = response.status();
    debug!(method, status = %status, "XRPC response received");
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<XrpcErrorResponse>(&body) {
        Ok(err) => format!(
            "{method} returned {status}: {}{}",
            err.error,
            err.message.map(|m| format!(": {m}")).unwrap_or_default()
        ),
        Err(_) => format!("{method} returned {status}: {body}"),
    };
    Err(ReplybotError::feed(message))
}

async fn decode<T: DeserializeOwned>(method: &str, response: Response) -> Result<T, ReplybotError> {
    let response = check_status(method, response).await?;
    let body = response.text().await.map_err(|e| ReplybotError::Feed {
        message: format!("failed to read {method} response: {e}"),
        source: Some(Box::new(e)),
    })?;
    serde_json::from_str(&body).map_err(|e| ReplybotError::Feed {
        message: format!("failed to parse {method} response: {e}"),
        source: Some(Box::new(e)),
    })
}
