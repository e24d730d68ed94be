//! Multi-signer fallback.
//!
//! The engine walks the configured signers in declaration order. For each one it runs the
//! selector, the budget gate, the approval policy and finally the signer itself; the first
//! signer to produce a payload wins and no later signer is touched. If every signer fails,
//! the per-signer failures are returned together, in order.
//!
//! Signers are tried strictly one after another: signing can consume one-shot resources
//! such as nonces, and at most one payload may come out of one call.

use crate::budget::BudgetManager;
use crate::errors::{Result, X402Error};
use crate::events::{PaymentEvent, PaymentEventKind, PaymentHooks};
use crate::selector::select_payment;
use crate::signers::PaymentSigner;
use crate::types::{PaymentPayload, PaymentRequirements};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Approval callback. Sees the candidate requirement (amount, resource, recipient) and
/// returns whether to pay it.
pub type ApprovalPolicy = Arc<dyn Fn(&PaymentRequirements) -> bool + Send + Sync>;

type Signed = (PaymentRequirements, u128, PaymentPayload);

/// Why a signer could not pay.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignerFailureKind {
    /// None of the offered requirements matched the signer's options
    NoAcceptableOption,
    /// The budget manager refused the amount
    PolicyRejected,
    /// The approval callback declined
    ApprovalDenied,
    /// The signer returned an error or an unusable payload
    SigningFailed,
}

/// One signer's failure.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SignerFailure {
    /// Position in the signer list
    pub index: usize,
    /// Signer priority
    pub priority: i32,
    /// Signer address
    pub address: String,
    /// Failure class
    pub kind: SignerFailureKind,
    /// Human-readable reason
    pub reason: String,
}

impl fmt::Display for SignerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "signer {} ({}, priority {}): {}",
            self.index, self.address, self.priority, self.reason
        )
    }
}

/// The payment a signer produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedPayment {
    /// Signed payload
    pub payload: PaymentPayload,
    /// Requirement it pays
    pub requirement: PaymentRequirements,
    /// Parsed amount of the requirement
    pub amount: u128,
    /// Index of the signer that produced it
    pub signer_index: usize,
    /// Address of that signer
    pub signer_address: String,
}

/// Drives the selector across an ordered list of signers.
#[derive(Clone)]
pub struct FallbackEngine {
    signers: Vec<Arc<dyn PaymentSigner>>,
    budget: Option<Arc<BudgetManager>>,
    approval: Option<ApprovalPolicy>,
    hooks: PaymentHooks,
}

impl FallbackEngine {
    /// Creates an engine over `signers`, in the order given.
    pub fn new(signers: Vec<Arc<dyn PaymentSigner>>) -> Self {
        Self {
            signers,
            budget: None,
            approval: None,
            hooks: PaymentHooks::default(),
        }
    }

    /// Gates every candidate through `budget`.
    pub fn with_budget(mut self, budget: Arc<BudgetManager>) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Asks `approval` before signing. Without one, every candidate is approved.
    pub fn with_approval(mut self, approval: ApprovalPolicy) -> Self {
        self.approval = Some(approval);
        self
    }

    /// Sets the lifecycle observers.
    pub fn with_hooks(mut self, hooks: PaymentHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Returns the signers in trial order.
    pub fn signers(&self) -> &[Arc<dyn PaymentSigner>] {
        &self.signers
    }

    /// Produces one signed payment for `requirements`, trying signers in order.
    pub async fn select_with_fallback(
        &self,
        requirements: &[PaymentRequirements],
    ) -> Result<SelectedPayment> {
        if self.signers.is_empty() {
            return Err(X402Error::ConfigError("no payment signers configured".to_string()));
        }

        let mut failures = Vec::with_capacity(self.signers.len());

        for (index, signer) in self.signers.iter().enumerate() {
            let address = signer.address();
            let priority = signer.priority();

            self.hooks.emit(
                PaymentEvent::new(PaymentEventKind::SignerAttempt)
                    .for_signer(index, priority, &address),
            );

            match self.try_signer(signer.as_ref(), requirements).await {
                Ok((requirement, amount, payload)) => {
                    info!(
                        signer = index,
                        address = %address,
                        amount,
                        network = %requirement.network,
                        "signer produced payment"
                    );
                    self.hooks.emit(
                        PaymentEvent::new(PaymentEventKind::SignerSuccess)
                            .for_requirement(&requirement)
                            .for_signer(index, priority, &address),
                    );
                    return Ok(SelectedPayment {
                        payload,
                        requirement,
                        amount,
                        signer_index: index,
                        signer_address: address,
                    });
                }
                Err((kind, reason)) => {
                    warn!(
                        signer = index,
                        address = %address,
                        ?kind,
                        reason = %reason,
                        "signer failed"
                    );
                    self.hooks.emit(
                        PaymentEvent::new(PaymentEventKind::SignerFailure)
                            .for_signer(index, priority, &address)
                            .with_error(reason.clone()),
                    );
                    failures.push(SignerFailure {
                        index,
                        priority,
                        address,
                        kind,
                        reason,
                    });
                }
            }
        }

        Err(aggregate(failures))
    }

    async fn try_signer(
        &self,
        signer: &dyn PaymentSigner,
        requirements: &[PaymentRequirements],
    ) -> std::result::Result<Signed, (SignerFailureKind, String)> {
        let requirement = select_payment(signer, requirements)
            .map_err(|e| (SignerFailureKind::NoAcceptableOption, e.to_string()))?;

        let amount = requirement
            .amount()
            .map_err(|e| (SignerFailureKind::NoAcceptableOption, e.to_string()))?;

        if let Some(budget) = &self.budget {
            budget
                .can_spend(amount, &requirement.resource)
                .map_err(|e| (SignerFailureKind::PolicyRejected, e.to_string()))?;
        }

        if let Some(approval) = &self.approval {
            if !approval(&requirement) {
                return Err((
                    SignerFailureKind::ApprovalDenied,
                    format!(
                        "payment of {} to {} for {} not approved",
                        requirement.max_amount_required, requirement.pay_to, requirement.resource
                    ),
                ));
            }
        }

        debug!(network = %requirement.network, amount, "signing payment");
        let payload = signer
            .sign_payment(&requirement)
            .await
            .map_err(|e| (SignerFailureKind::SigningFailed, e.to_string()))?;

        if !requirement.matches(&payload) {
            return Err((
                SignerFailureKind::SigningFailed,
                format!(
                    "signer produced a {}/{} payload for a {}/{} requirement",
                    payload.scheme, payload.network, requirement.scheme, requirement.network
                ),
            ));
        }

        Ok((requirement, amount, payload))
    }
}

impl fmt::Debug for FallbackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackEngine")
            .field(
                "signers",
                &self.signers.iter().map(|s| s.address()).collect::<Vec<_>>(),
            )
            .field("budget", &self.budget.is_some())
            .field("approval", &self.approval.is_some())
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Folds the per-signer failures into one error.
///
/// A uniform "nothing matched" collapses to `NoAcceptablePayment`, a uniform policy or
/// approval decline to `PolicyRejection`; anything mixed stays `AllSignersFailed`.
fn aggregate(failures: Vec<SignerFailure>) -> X402Error {
    let reasons = || {
        failures
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    };

    let all = |pred: fn(SignerFailureKind) -> bool| failures.iter().all(|f| pred(f.kind));

    if all(|k| k == SignerFailureKind::NoAcceptableOption) {
        X402Error::NoAcceptablePayment(reasons())
    } else if all(|k| {
        matches!(
            k,
            SignerFailureKind::PolicyRejected | SignerFailureKind::ApprovalDenied
        )
    }) {
        X402Error::PolicyRejection(reasons())
    } else {
        X402Error::AllSignersFailed(failures)
    }
}
