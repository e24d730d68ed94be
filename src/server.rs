//! Server-side payment gate.
//!
//! [`PaymentMiddleware`] wraps any [`RpcHandler`] and charges for selected targets. A
//! protected call without a payment gets a payment-required signal listing the accepted
//! requirements; a paid call is verified and settled through a [`Facilitator`] before the
//! inner handler runs, and the settlement is stamped into the result's `_meta`.

use crate::errors::{Result, X402Error};
use crate::facilitator::{Facilitator, SupportedCache};
use crate::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use crate::types::{
    PaymentPayload, PaymentRequiredResponse, PaymentRequirements, SettlementResponse, SCHEME_EXACT,
    USDC_BASE, X402_VERSION,
};
use crate::utils::dollar_to_token_amount;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handles one JSON-RPC request.
///
/// Failures are expressed as JSON-RPC error responses, so handling itself cannot fail.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    /// Handles `request`.
    async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse;
}

#[async_trait]
impl<T: RpcHandler + ?Sized> RpcHandler for Arc<T> {
    async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        (**self).handle(request).await
    }
}

/// [`RpcHandler`] backed by an async closure. See [`handler_fn`].
pub struct FnHandler<F>(F);

/// Wraps an async closure as an [`RpcHandler`].
///
/// # Examples
///
/// ```
/// use x402_rpc::jsonrpc::JsonRpcResponse;
/// use x402_rpc::server::handler_fn;
/// use serde_json::json;
///
/// let echo = handler_fn(|request| async move {
///     JsonRpcResponse::success(request.id, json!({"content": []}))
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(JsonRpcRequest) -> Fut + Send + Sync,
    Fut: Future<Output = JsonRpcResponse> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> RpcHandler for FnHandler<F>
where
    F: Fn(JsonRpcRequest) -> Fut + Send + Sync,
    Fut: Future<Output = JsonRpcResponse> + Send,
{
    async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        (self.0)(request).await
    }
}

/// Configuration for a priced tool.
#[derive(Clone, Debug)]
pub struct PaymentConfig {
    /// Address to receive payments
    pub pay_to: String,

    /// Token contract address (e.g., USDC)
    pub asset: String,

    /// Token decimals (e.g., 6 for USDC)
    pub decimals: u8,

    /// Network name (e.g., "base")
    pub network: String,

    /// Payment scheme (e.g., "exact")
    pub scheme: String,

    /// Price in USD
    pub price_usd: f64,

    /// Description of what the payment is for
    pub description: String,

    /// Maximum timeout in seconds for payment validity
    pub max_timeout_seconds: u64,

    /// Token name and version for EIP-712 (optional)
    pub token_name: Option<String>,
    pub token_version: Option<String>,
}

impl PaymentConfig {
    /// Creates a new payment configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use x402_rpc::server::PaymentConfig;
    ///
    /// let config = PaymentConfig::new(
    ///     "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb",
    ///     "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", // USDC on Base
    ///     6,
    ///     "base",
    ///     "exact",
    ///     0.01, // $0.01
    ///     "Weather lookup",
    /// );
    /// ```
    pub fn new(
        pay_to: impl Into<String>,
        asset: impl Into<String>,
        decimals: u8,
        network: impl Into<String>,
        scheme: impl Into<String>,
        price_usd: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            pay_to: pay_to.into(),
            asset: asset.into(),
            decimals,
            network: network.into(),
            scheme: scheme.into(),
            price_usd,
            description: description.into(),
            max_timeout_seconds: 300,
            token_name: None,
            token_version: None,
        }
    }

    /// USDC on Base mainnet, exact scheme.
    pub fn usdc_base(pay_to: &str, price_usd: f64, description: &str) -> Self {
        Self::new(pay_to, USDC_BASE, 6, "base", SCHEME_EXACT, price_usd, description)
            .with_token_metadata("USD Coin", "2")
    }

    /// Sets the timeout for payment validity.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    /// Sets token metadata for EIP-712.
    pub fn with_token_metadata(
        mut self,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.token_name = Some(name.into());
        self.token_version = Some(version.into());
        self
    }

    /// Converts the configuration to payment requirements for `resource`.
    pub fn to_requirements(&self, resource: &str) -> Result<PaymentRequirements> {
        let amount = dollar_to_token_amount(self.price_usd, self.decimals, 1.0)?;

        let mut extra = Map::new();
        if let Some(name) = &self.token_name {
            extra.insert("name".to_string(), json!(name));
        }
        if let Some(version) = &self.token_version {
            extra.insert("version".to_string(), json!(version));
        }

        Ok(PaymentRequirements {
            scheme: self.scheme.clone(),
            network: self.network.clone(),
            max_amount_required: amount,
            resource: resource.to_string(),
            description: Some(self.description.clone()),
            mime_type: None,
            output_schema: None,
            pay_to: self.pay_to.clone(),
            max_timeout_seconds: self.max_timeout_seconds,
            asset: self.asset.clone(),
            extra: (!extra.is_empty()).then_some(Value::Object(extra)),
        })
    }
}

/// Middleware behaviour switches.
#[derive(Clone, Debug)]
pub struct MiddlewareConfig {
    /// Verify payments but skip settlement; a simulated settlement is reported
    pub verify_only: bool,

    /// MIME type stamped on requirements that do not name one
    pub default_mime_type: String,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            verify_only: false,
            default_mime_type: "application/json".to_string(),
        }
    }
}

impl MiddlewareConfig {
    /// Creates the default configuration: settle every payment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables verify-only mode.
    pub fn with_verify_only(mut self, verify_only: bool) -> Self {
        self.verify_only = verify_only;
        self
    }

    /// Sets the default MIME type.
    pub fn with_default_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.default_mime_type = mime_type.into();
        self
    }
}

/// Charges for protected targets before delegating to the inner handler.
pub struct PaymentMiddleware<H: RpcHandler, F: Facilitator> {
    inner: H,
    facilitator: F,
    config: MiddlewareConfig,
    tools: HashMap<String, Vec<PaymentRequirements>>,
    supported: Arc<SupportedCache>,
}

impl<H: RpcHandler, F: Facilitator> PaymentMiddleware<H, F> {
    /// Wraps `inner`, verifying and settling through `facilitator`.
    pub fn new(inner: H, facilitator: F) -> Self {
        Self {
            inner,
            facilitator,
            config: MiddlewareConfig::default(),
            tools: HashMap::new(),
            supported: Arc::new(SupportedCache::new()),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: MiddlewareConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares an existing facilitator-extras cache.
    pub fn with_supported_cache(mut self, cache: Arc<SupportedCache>) -> Self {
        self.supported = cache;
        self
    }

    /// Charges for `tool`, accepting any of `accepts`.
    pub fn protect(mut self, tool: impl Into<String>, accepts: Vec<PaymentRequirements>) -> Self {
        self.tools.insert(tool.into(), accepts);
        self
    }

    /// Charges for `tool` at the price in `config`.
    pub fn protect_priced(self, tool: impl Into<String>, config: &PaymentConfig) -> Result<Self> {
        let requirement = config.to_requirements("")?;
        Ok(self.protect(tool, vec![requirement]))
    }

    /// Loads facilitator-declared extras (such as a fee payer) into the cache.
    pub async fn refresh_supported(&self) -> Result<()> {
        let supported = self.facilitator.supported().await?;
        info!(kinds = supported.kinds.len(), "loaded facilitator supported kinds");
        self.supported.load(&supported);
        Ok(())
    }

    /// Returns true if calls to `target` must be paid.
    pub fn is_protected(&self, target: &str) -> bool {
        self.tools.contains_key(target)
    }

    /// Returns the requirement set advertised for `target`, with defaults and
    /// facilitator extras filled in.
    pub fn requirements_for(&self, target: &str) -> Option<Vec<PaymentRequirements>> {
        let accepts = self.tools.get(target)?;
        Some(
            accepts
                .iter()
                .cloned()
                .map(|mut requirement| {
                    if requirement.resource.is_empty() {
                        requirement.resource = format!("mcp://tools/{}", target);
                    }
                    if requirement.mime_type.is_none() {
                        requirement.mime_type = Some(self.config.default_mime_type.clone());
                    }
                    self.supported.merge_into(&mut requirement);
                    requirement
                })
                .collect(),
        )
    }

    /// Verifies `payload` and, unless in verify-only mode, settles it.
    ///
    /// A facilitator that answers but declines yields [`X402Error::VerificationFailed`]
    /// or [`X402Error::SettlementError`]; one that cannot be used yields
    /// [`X402Error::FacilitatorUnavailable`].
    async fn charge(
        &self,
        payload: &PaymentPayload,
        requirement: &PaymentRequirements,
    ) -> Result<SettlementResponse> {
        let verification = self
            .facilitator
            .verify(payload, requirement)
            .await
            .map_err(unavailable)?;

        if !verification.is_valid {
            return Err(X402Error::VerificationFailed(
                verification
                    .invalid_reason
                    .unwrap_or_else(|| "payment verification failed".to_string()),
            ));
        }

        if self.config.verify_only {
            debug!(network = %payload.network, "verify-only mode, skipping settlement");
            return Ok(SettlementResponse {
                success: true,
                transaction: String::new(),
                network: payload.network.clone(),
                payer: verification.payer,
                error_reason: None,
            });
        }

        let settlement = self
            .facilitator
            .settle(payload, requirement)
            .await
            .map_err(unavailable)?;

        if !settlement.success {
            return Err(X402Error::SettlementError(
                settlement
                    .error_reason
                    .unwrap_or_else(|| "settlement unsuccessful".to_string()),
            ));
        }
        Ok(settlement)
    }
}

fn unavailable(err: X402Error) -> X402Error {
    match err {
        X402Error::FacilitatorUnavailable(_) => err,
        other => X402Error::FacilitatorUnavailable(other.to_string()),
    }
}

fn payment_required(
    id: Value,
    accepts: Vec<PaymentRequirements>,
    error: Option<String>,
) -> JsonRpcResponse {
    let required = PaymentRequiredResponse {
        x402_version: X402_VERSION,
        accepts,
        error,
    };
    let error = JsonRpcError::payment_required(&required)
        .unwrap_or_else(|e| JsonRpcError::internal(e.to_string()));
    JsonRpcResponse::failure(id, error)
}

#[async_trait]
impl<H: RpcHandler, F: Facilitator> RpcHandler for PaymentMiddleware<H, F> {
    async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let target = request.target().to_string();
        let Some(accepts) = self.requirements_for(&target) else {
            return self.inner.handle(request).await;
        };
        let id = request.id.clone();

        let payload = match request.payment() {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(target = %target, "payment required");
                return payment_required(id, accepts, None);
            }
            Err(e) => {
                return JsonRpcResponse::failure(id, JsonRpcError::invalid_params(e.to_string()))
            }
        };

        let Some(requirement) = accepts.iter().find(|r| r.matches(&payload)).cloned() else {
            warn!(
                target = %target,
                network = %payload.network,
                scheme = %payload.scheme,
                "payment matches no accepted requirement"
            );
            return JsonRpcResponse::failure(
                id,
                JsonRpcError::invalid_params(format!(
                    "no accepted requirement for {}/{}",
                    payload.scheme, payload.network
                )),
            );
        };

        let settlement = match self.charge(&payload, &requirement).await {
            Ok(settlement) => settlement,
            Err(X402Error::VerificationFailed(reason)) => {
                warn!(target = %target, reason = %reason, "payment rejected");
                return payment_required(id, accepts, Some(reason));
            }
            Err(e) => {
                warn!(target = %target, error = %e, "payment could not be processed");
                return JsonRpcResponse::failure(id, JsonRpcError::from(&e));
            }
        };

        info!(
            target = %target,
            network = %settlement.network,
            transaction = %settlement.transaction,
            "payment accepted"
        );

        let response = self.inner.handle(request).await;
        if response.is_error() {
            warn!(target = %target, "handler failed after payment settled");
            return response;
        }

        let unstamped = response.clone();
        response.with_settlement(&settlement).unwrap_or_else(|e| {
            warn!(error = %e, "could not attach settlement to result");
            unstamped
        })
    }
}
