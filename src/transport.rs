//! JSON-RPC transports.
//!
//! The client is generic over [`Transport`] so it can run over HTTP, stdio or an
//! in-process channel. [`HttpTransport`] posts the JSON-RPC envelope with reqwest.

use crate::errors::{Result, X402Error};
use crate::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::types::PaymentRequiredResponse;
use crate::utils::decode_header;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Header some gateways use to carry base64-encoded payment requirements on an HTTP 402.
pub const PAYMENT_REQUIRED_HEADER: &str = "payment-required";

/// Sends one JSON-RPC request and returns its response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request`.
    ///
    /// A JSON-RPC error is a successful send: it comes back as `Ok` with `error` set.
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;
}

/// JSON-RPC over HTTP POST.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    endpoint: Url,
    client: Client,
}

impl HttpTransport {
    /// Creates a transport posting to `endpoint`.
    pub fn new(endpoint: &str) -> Result<Self> {
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            client: Client::new(),
        })
    }

    /// Creates a transport whose HTTP client gives up after `timeout`.
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: Url::parse(endpoint)?,
            client,
        })
    }

    /// Replaces the HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Returns the endpoint URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        debug!(endpoint = %self.endpoint, method = %request.method, "sending JSON-RPC request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if status == StatusCode::PAYMENT_REQUIRED {
            let required = payment_required_from_http(&headers, &body)?;
            debug!(
                options = required.accepts.len(),
                "HTTP 402 translated to payment-required signal"
            );
            return Ok(JsonRpcResponse::failure(
                request.id,
                JsonRpcError::payment_required(&required)?,
            ));
        }

        match serde_json::from_str::<JsonRpcResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) if status.is_success() => Err(X402Error::Transport(format!(
                "invalid JSON-RPC response: {}",
                e
            ))),
            Err(_) => {
                warn!(status = %status, "JSON-RPC endpoint returned HTTP error");
                Err(X402Error::Transport(format!("HTTP {}: {}", status, body)))
            }
        }
    }
}

/// Reads payment requirements off an HTTP 402.
///
/// The `payment-required` header wins when present; otherwise the body is either a
/// JSON-RPC envelope already carrying the signal or a bare [`PaymentRequiredResponse`].
fn payment_required_from_http(headers: &HeaderMap, body: &str) -> Result<PaymentRequiredResponse> {
    if let Some(encoded) = headers
        .get(PAYMENT_REQUIRED_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        return decode_header(encoded);
    }

    if let Ok(envelope) = serde_json::from_str::<JsonRpcResponse>(body) {
        if let Some(required) = envelope.payment_required()? {
            return Ok(required);
        }
    }

    serde_json::from_str(body).map_err(|e| {
        X402Error::InvalidPayload(format!("HTTP 402 without payment requirements: {}", e))
    })
}
