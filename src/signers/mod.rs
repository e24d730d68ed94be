//! Payment signers.
//!
//! A signer holds payment credentials and can turn a [`PaymentRequirements`] into a signed
//! [`PaymentPayload`]. Each signer declares up front which (network, asset) pairs it will
//! pay with through its [`ClientPaymentOption`]s; the selector only ever hands a signer
//! requirements that match one of those options.

pub mod exact_evm;

use crate::errors::Result;
use crate::types::{ClientPaymentOption, PaymentPayload, PaymentRequirements};
use async_trait::async_trait;

pub use exact_evm::EvmSigner;

/// Capability for producing signed payments.
///
/// `sign_payment` may consume one-shot resources (a nonce, a recent blockhash), so the
/// fallback engine never calls it concurrently for the same logical payment.
#[async_trait]
pub trait PaymentSigner: Send + Sync {
    /// Signs a payment for `requirement`.
    ///
    /// Implementations must produce a fresh payload on every call and must refuse
    /// requirements whose amount exceeds their declared option ceiling.
    async fn sign_payment(&self, requirement: &PaymentRequirements) -> Result<PaymentPayload>;

    /// Returns the address payments are made from.
    fn address(&self) -> String;

    /// Returns true if the signer can pay on `network`.
    fn supports_network(&self, network: &str) -> bool;

    /// Returns true if the signer holds `asset` on `network`.
    fn has_asset(&self, asset: &str, network: &str) -> bool;

    /// Returns the declared option for `asset` on `network`, if any.
    fn payment_option(&self, network: &str, asset: &str) -> Option<ClientPaymentOption>;

    /// Returns the signer's own priority, used for reporting.
    fn priority(&self) -> i32;
}
