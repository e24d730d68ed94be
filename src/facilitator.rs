//! Facilitator client.
//!
//! A facilitator verifies payment payloads and settles them on-chain on behalf of the
//! server. The middleware talks to it through the [`Facilitator`] trait; [`HttpFacilitator`]
//! speaks the usual `/verify`, `/settle` and `/supported` HTTP endpoints.

use crate::errors::{Result, X402Error};
use crate::types::{
    PaymentPayload, PaymentRequirements, SettleRequest, SettlementResponse, SupportedResponse,
    VerificationResponse, VerifyRequest, X402_VERSION,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default HTTP timeout for facilitator requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Verification and settlement backend.
///
/// Transport trouble and unreadable replies are errors
/// ([`X402Error::FacilitatorUnavailable`]); a payment the facilitator looked at and
/// refused is an `Ok` response with `is_valid == false` or `success == false`.
#[async_trait]
pub trait Facilitator: Send + Sync {
    /// Checks `payload` against `requirements` without moving funds.
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerificationResponse>;

    /// Executes the payment.
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettlementResponse>;

    /// Lists the (scheme, network) kinds the facilitator handles.
    async fn supported(&self) -> Result<SupportedResponse>;
}

/// [`Facilitator`] reached over HTTP.
#[derive(Clone, Debug)]
pub struct HttpFacilitator {
    client: Client,
    base_url: String,
}

impl HttpFacilitator {
    /// Creates a client for the facilitator at `url` with the default timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use x402_rpc::facilitator::HttpFacilitator;
    ///
    /// let facilitator = HttpFacilitator::new("https://x402.org/facilitator/").unwrap();
    /// assert_eq!(facilitator.base_url(), "https://x402.org/facilitator");
    /// ```
    pub fn new(url: &str) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    /// Creates a client whose requests give up after `timeout`.
    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        url::Url::parse(url)?;
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            X402Error::ConfigError(format!("failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the normalised base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "calling facilitator");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                X402Error::FacilitatorUnavailable(format!("{} request failed: {}", path, e))
            })?;

        read_json(path, response).await
    }
}

async fn read_json<R: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<R> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(X402Error::FacilitatorUnavailable(format!(
            "facilitator /{} returned {}: {}",
            path, status, body
        )));
    }

    response.json().await.map_err(|e| {
        X402Error::FacilitatorUnavailable(format!("failed to parse /{} response: {}", path, e))
    })
}

#[async_trait]
impl Facilitator for HttpFacilitator {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerificationResponse> {
        let request = VerifyRequest {
            x402_version: X402_VERSION,
            payment_payload: payload.clone(),
            payment_requirements: requirements.clone(),
        };

        let verification: VerificationResponse = self.post("verify", &request).await?;

        if verification.is_valid {
            debug!(payer = ?verification.payer, "payment verified");
        } else {
            warn!(reason = ?verification.invalid_reason, "payment verification failed");
        }
        Ok(verification)
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettlementResponse> {
        let request = SettleRequest {
            x402_version: X402_VERSION,
            payment_payload: payload.clone(),
            payment_requirements: requirements.clone(),
        };

        let settlement: SettlementResponse = self.post("settle", &request).await?;

        if settlement.success {
            info!(
                transaction = %settlement.transaction,
                network = %settlement.network,
                "payment settled"
            );
        } else {
            warn!(reason = ?settlement.error_reason, "payment settlement failed");
        }
        Ok(settlement)
    }

    async fn supported(&self) -> Result<SupportedResponse> {
        let url = format!("{}/supported", self.base_url);
        debug!(url = %url, "querying facilitator supported kinds");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                X402Error::FacilitatorUnavailable(format!("supported request failed: {}", e))
            })?;

        let supported: SupportedResponse = read_json("supported", response).await?;
        debug!(kinds = supported.kinds.len(), "facilitator kinds loaded");
        Ok(supported)
    }
}

/// Facilitator-declared extras keyed by (scheme, network).
///
/// Filled from `/supported` at startup and read on every paid call.
#[derive(Debug, Default)]
pub struct SupportedCache {
    extras: RwLock<HashMap<(String, String), Map<String, Value>>>,
}

impl SupportedCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached extras with those in `supported`.
    pub fn load(&self, supported: &SupportedResponse) {
        let fresh: HashMap<_, _> = supported
            .kinds
            .iter()
            .filter_map(|kind| {
                let extra = kind.extra.as_ref()?.as_object()?.clone();
                Some(((kind.scheme.clone(), kind.network.clone()), extra))
            })
            .collect();

        *self.extras.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    /// Returns the extras declared for `scheme` on `network`.
    pub fn extra_for(&self, scheme: &str, network: &str) -> Option<Map<String, Value>> {
        self.extras
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(scheme.to_string(), network.to_string()))
            .cloned()
    }

    /// Copies declared extras into `requirement.extra`. Keys already set are kept.
    pub fn merge_into(&self, requirement: &mut PaymentRequirements) {
        let Some(declared) = self.extra_for(&requirement.scheme, &requirement.network) else {
            return;
        };

        let extra = requirement
            .extra
            .get_or_insert_with(|| Value::Object(Map::new()));
        if let Some(extra) = extra.as_object_mut() {
            for (key, value) in declared {
                extra.entry(key).or_insert(value);
            }
        }
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.extras
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}
