//! Client-side payment orchestration.
//!
//! [`X402Client`] wraps a [`Transport`] and turns a payment-required signal into a paid
//! retry: it picks a requirement and a signer through the [`FallbackEngine`], attaches
//! the signed payload to the request's `_meta` side channel and re-issues the call once.
//! A call is paid at most once; a second payment demand on the retry is reported as
//! [`X402Error::ServerRejectedPayment`].

use crate::budget::{BudgetManager, BudgetMetrics};
use crate::errors::{Result, X402Error};
use crate::events::{PaymentEvent, PaymentEventKind, PaymentHooks};
use crate::fallback::{ApprovalPolicy, FallbackEngine, SelectedPayment};
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use crate::signers::PaymentSigner;
use crate::transport::Transport;
use crate::types::SettlementResponse;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for [`X402Client`].
#[derive(Clone)]
pub struct X402ClientConfig {
    /// Signers in fallback order
    pub signers: Vec<Arc<dyn PaymentSigner>>,

    /// Spending limits; none when unset
    pub budget: Option<Arc<BudgetManager>>,

    /// Approval callback consulted before every signature
    pub approval: Option<ApprovalPolicy>,

    /// Lifecycle observers
    pub hooks: PaymentHooks,

    /// Deadline applied to each transport leg separately
    pub timeout: Option<Duration>,
}

impl X402ClientConfig {
    /// Creates a configuration paying with a single signer.
    ///
    /// # Examples
    ///
    /// ```
    /// use x402_rpc::client::X402ClientConfig;
    /// use x402_rpc::signers::EvmSigner;
    /// use x402_rpc::types::ClientPaymentOption;
    ///
    /// let signer = EvmSigner::new(
    ///     "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    /// )
    /// .unwrap()
    /// .with_option(ClientPaymentOption::usdc_base_sepolia());
    ///
    /// let config = X402ClientConfig::new(signer);
    /// assert_eq!(config.signers.len(), 1);
    /// ```
    pub fn new(signer: impl PaymentSigner + 'static) -> Self {
        Self::with_signers(vec![Arc::new(signer)])
    }

    /// Creates a configuration trying `signers` in order.
    pub fn with_signers(signers: Vec<Arc<dyn PaymentSigner>>) -> Self {
        Self {
            signers,
            budget: None,
            approval: None,
            hooks: PaymentHooks::default(),
            timeout: None,
        }
    }

    /// Appends a fallback signer.
    pub fn with_signer(mut self, signer: Arc<dyn PaymentSigner>) -> Self {
        self.signers.push(signer);
        self
    }

    /// Enforces `budget` on every payment.
    pub fn with_budget(mut self, budget: Arc<BudgetManager>) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Asks `approval` before each payment.
    pub fn with_approval(
        mut self,
        approval: impl Fn(&crate::types::PaymentRequirements) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.approval = Some(Arc::new(approval));
        self
    }

    /// Sets the lifecycle observers.
    pub fn with_hooks(mut self, hooks: PaymentHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Bounds each transport leg by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of a call through [`X402Client`].
#[derive(Debug, Clone)]
pub struct PaidResponse {
    /// Final response from the server
    pub response: JsonRpcResponse,

    /// The payment made, if the server asked for one
    pub payment: Option<SelectedPayment>,

    /// Settlement confirmation the server stamped on the result
    pub settlement: Option<SettlementResponse>,
}

impl PaidResponse {
    /// Returns true if a payment was attached to the call.
    pub fn was_paid(&self) -> bool {
        self.payment.is_some()
    }

    /// Returns the JSON-RPC result, if any.
    pub fn result(&self) -> Option<&Value> {
        self.response.result.as_ref()
    }
}

/// JSON-RPC client that pays for calls on demand.
pub struct X402Client<T: Transport> {
    transport: T,
    engine: FallbackEngine,
    budget: Option<Arc<BudgetManager>>,
    hooks: PaymentHooks,
    timeout: Option<Duration>,
    next_id: AtomicU64,
}

impl<T: Transport> X402Client<T> {
    /// Creates a client sending through `transport`.
    pub fn new(transport: T, config: X402ClientConfig) -> Self {
        let mut engine = FallbackEngine::new(config.signers).with_hooks(config.hooks.clone());
        if let Some(budget) = &config.budget {
            engine = engine.with_budget(budget.clone());
        }
        if let Some(approval) = config.approval {
            engine = engine.with_approval(approval);
        }

        Self {
            transport,
            engine,
            budget: config.budget,
            hooks: config.hooks,
            timeout: config.timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns current budget metrics, if a budget is configured.
    pub fn budget_metrics(&self) -> Option<BudgetMetrics> {
        self.budget.as_ref().map(|b| b.metrics())
    }

    /// Invokes tool `name` with `arguments`, paying if asked to.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<PaidResponse> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.call(JsonRpcRequest::tool_call(id, name, arguments)).await
    }

    /// Sends `request`, paying and retrying once if the server demands payment.
    ///
    /// Responses other than a payment demand, including ordinary JSON-RPC errors, are
    /// returned untouched. Transport errors propagate from either leg; a payment handed to
    /// the transport is recorded against the budget even when its leg fails.
    pub async fn call(&self, request: JsonRpcRequest) -> Result<PaidResponse> {
        let response = self.leg(self.transport.send(request.clone())).await?;

        let required = match response.payment_required()? {
            Some(required) => required,
            None => {
                return Ok(PaidResponse {
                    response,
                    payment: None,
                    settlement: None,
                })
            }
        };

        info!(
            target = %request.target(),
            options = required.accepts.len(),
            "payment required"
        );
        let mut attempt = PaymentEvent::new(PaymentEventKind::Attempt);
        if let Some(first) = required.accepts.first() {
            attempt = attempt.for_requirement(first);
        }
        self.hooks.emit(attempt);

        let selected = match self.engine.select_with_fallback(&required.accepts).await {
            Ok(selected) => selected,
            Err(e) => {
                warn!(error = %e, "no payment could be produced");
                self.hooks
                    .emit(PaymentEvent::new(PaymentEventKind::Failure).with_error(e.to_string()));
                return Err(e);
            }
        };

        let retry = request.clone().with_payment(&selected.payload)?;
        let sent = self.leg(self.transport.send(retry)).await;

        // The signed payload has left the client; it counts against the budget even if
        // the retry leg failed.
        if let Some(budget) = &self.budget {
            budget.record_payment(selected.amount, &selected.requirement.resource);
        }

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "paid retry failed");
                self.hooks.emit(
                    PaymentEvent::new(PaymentEventKind::Failure)
                        .for_requirement(&selected.requirement)
                        .with_error(e.to_string()),
                );
                return Err(e);
            }
        };

        if let Some(again) = response.payment_required()? {
            let reason = again
                .error
                .unwrap_or_else(|| "payment demanded again after paying".to_string());
            warn!(reason = %reason, "server rejected payment");
            self.hooks.emit(
                PaymentEvent::new(PaymentEventKind::Failure)
                    .for_requirement(&selected.requirement)
                    .with_error(reason.clone()),
            );
            return Err(X402Error::ServerRejectedPayment(reason));
        }

        let settlement = response.settlement()?;
        match &settlement {
            Some(s) if s.success => {
                info!(transaction = %s.transaction, network = %s.network, "payment settled");
                self.hooks.emit(
                    PaymentEvent::new(PaymentEventKind::Success)
                        .for_requirement(&selected.requirement),
                );
            }
            Some(s) => {
                let reason = s
                    .error_reason
                    .clone()
                    .unwrap_or_else(|| "settlement unsuccessful".to_string());
                warn!(reason = %reason, "server reported failed settlement");
                self.hooks.emit(
                    PaymentEvent::new(PaymentEventKind::Failure)
                        .for_requirement(&selected.requirement)
                        .with_error(reason),
                );
            }
            None => debug!("paid response carried no settlement"),
        }

        Ok(PaidResponse {
            response,
            payment: Some(selected),
            settlement,
        })
    }

    async fn leg<F>(&self, send: F) -> Result<JsonRpcResponse>
    where
        F: Future<Output = Result<JsonRpcResponse>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| X402Error::TimeoutExceeded)?,
            None => send.await,
        }
    }
}
