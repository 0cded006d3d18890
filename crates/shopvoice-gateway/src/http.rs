//! HTTP transport for the assistant backend.
//!
//! `POST {base}/chat` with `{"text": ...}`, one attempt, reqwest's default
//! timeouts. Any non-2xx status, transport error or undecodable body is a
//! `GatewayError`; error bodies are not inspected.

use async_trait::async_trait;
use reqwest::{Client, Url};
use shopvoice_core::{TurnRequest, TurnResponse};

use crate::error::GatewayError;
use crate::RemoteGateway;

/// reqwest-backed `RemoteGateway`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a gateway for `base_url`, e.g. `http://localhost:8000`.
    /// A trailing slash is ignored; only http(s) URLs are accepted.
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        let parsed =
            Url::parse(&base_url).map_err(|_| GatewayError::InvalidBaseUrl(base_url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GatewayError::InvalidBaseUrl(base_url));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Probe `GET {base}/health`. Used at startup only; never retried.
    pub async fn health(&self) -> Result<(), GatewayError> {
        let response = self.client.get(self.endpoint("/health")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn send_turn(&self, text: &str) -> Result<TurnResponse, GatewayError> {
        let request = TurnRequest {
            text: text.to_string(),
        };

        let response = self
            .client
            .post(self.endpoint("/chat"))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Backend rejected turn");
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let turn: TurnResponse = serde_json::from_str(&body)?;

        tracing::debug!(
            reply_len = turn.reply.len(),
            tool = turn.last_tool.as_ref().and_then(|t| t.name()).unwrap_or("-"),
            docs = turn.retrieved_docs.as_ref().map_or(0, Vec::len),
            elapsed_ms = turn.elapsed_ms,
            ssml_len = turn.reply_ssml.as_ref().map_or(0, String::len),
            "Backend replied"
        );
        Ok(turn)
    }
}
