//! Core type definitions for the x402 protocol.
//!
//! This module contains the data structures shared by the paying client, the payment
//! middleware and the facilitator client: payment requirements, payloads, verification
//! and settlement results, and the per-signer payment options a client declares.

use crate::errors::Result;
use crate::utils::parse_amount;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version of the x402 protocol.
pub const X402_VERSION: u32 = 1;

/// The "exact" payment scheme: the payer authorizes exactly `maxAmountRequired`.
pub const SCHEME_EXACT: &str = "exact";

/// USDC contract address on Base mainnet.
pub const USDC_BASE: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

/// USDC contract address on Base Sepolia.
pub const USDC_BASE_SEPOLIA: &str = "0x036CbD53842c5426634e7929541eC2318f3dCF7e";

/// Payload of a payment-required signal.
///
/// Contains the list of accepted payment requirements that the client can choose from.
///
/// # Examples
///
/// ```
/// use x402_rpc::types::PaymentRequiredResponse;
///
/// let response = PaymentRequiredResponse {
///     x402_version: 1,
///     accepts: vec![],
///     error: None,
/// };
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredResponse {
    /// Protocol version (currently 1)
    pub x402_version: u32,

    /// List of accepted payment requirements
    pub accepts: Vec<PaymentRequirements>,

    /// Optional error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Describes one way a server is willing to be paid for a call.
///
/// Each requirement specifies the payment scheme, network, amount, recipient address,
/// and other metadata necessary for the payment. Requirements are immutable once issued.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme (e.g., "exact")
    pub scheme: String,

    /// Network identifier (e.g., "base", "base-sepolia", "eip155:8453")
    pub network: String,

    /// Maximum amount required in the smallest unit of `asset`.
    /// Represented as a decimal string to handle uint256
    pub max_amount_required: String,

    /// The resource identifier the payment is for
    #[serde(default)]
    pub resource: String,

    /// Human-readable description of what the payment is for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type of the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// JSON schema describing the output format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

    /// Recipient address
    pub pay_to: String,

    /// Maximum time in seconds that the payment is valid
    #[serde(default)]
    pub max_timeout_seconds: u64,

    /// Token contract address (e.g., USDC contract address)
    pub asset: String,

    /// Scheme-specific extra data (e.g., {"name": "USDC", "version": "2"} for EIP-3009)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl PaymentRequirements {
    /// Parses `max_amount_required` as a positive integer amount.
    pub fn amount(&self) -> Result<u128> {
        parse_amount(&self.max_amount_required)
    }

    /// Returns true when `payload` was produced for this requirement's network and scheme.
    pub fn matches(&self, payload: &PaymentPayload) -> bool {
        self.network == payload.network && self.scheme == payload.scheme
    }
}

/// A payment option a signer is willing to pay with.
///
/// Options are declared per signer at construction time. `priority` orders the options
/// of one signer (lower is preferred), `max_amount` caps what the signer will pay for
/// a single call on this option.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientPaymentOption {
    /// Payment scheme
    pub scheme: String,

    /// Network identifier
    pub network: String,

    /// Token contract address
    pub asset: String,

    /// Preference among this signer's options; lower wins
    #[serde(default)]
    pub priority: i32,

    /// Client-side ceiling per payment, in the asset's smallest unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<String>,

    /// Minimum balance the signer wants to keep, in the asset's smallest unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_balance: Option<String>,

    /// Scheme-specific extra data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl ClientPaymentOption {
    /// Creates an option with priority 0 and no ceiling.
    ///
    /// # Examples
    ///
    /// ```
    /// use x402_rpc::types::{ClientPaymentOption, USDC_BASE};
    ///
    /// let option = ClientPaymentOption::new("exact", "base", USDC_BASE)
    ///     .with_priority(1)
    ///     .with_max_amount("50000");
    /// assert_eq!(option.priority, 1);
    /// ```
    pub fn new(
        scheme: impl Into<String>,
        network: impl Into<String>,
        asset: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            network: network.into(),
            asset: asset.into(),
            priority: 0,
            max_amount: None,
            min_balance: None,
            extra: None,
        }
    }

    /// USDC on Base mainnet with the "exact" scheme.
    pub fn usdc_base() -> Self {
        Self::new(SCHEME_EXACT, "base", USDC_BASE)
    }

    /// USDC on Base Sepolia with the "exact" scheme.
    pub fn usdc_base_sepolia() -> Self {
        Self::new(SCHEME_EXACT, "base-sepolia", USDC_BASE_SEPOLIA)
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the per-payment ceiling.
    pub fn with_max_amount(mut self, max_amount: impl Into<String>) -> Self {
        self.max_amount = Some(max_amount.into());
        self
    }

    /// Sets the minimum balance to keep.
    pub fn with_min_balance(mut self, min_balance: impl Into<String>) -> Self {
        self.min_balance = Some(min_balance.into());
        self
    }

    /// Returns true when this option covers `asset` on `network`.
    ///
    /// Hex contract addresses compare case-insensitively.
    pub fn covers(&self, network: &str, asset: &str) -> bool {
        self.network == network && self.asset.eq_ignore_ascii_case(asset)
    }
}

/// Payment payload sent by the client in the call's payment side channel.
///
/// # Examples
///
/// ```
/// use x402_rpc::types::PaymentPayload;
/// use serde_json::json;
///
/// let payload = PaymentPayload {
///     x402_version: 1,
///     scheme: "exact".to_string(),
///     network: "base".to_string(),
///     payload: json!({"from": "0x...", "to": "0x..."}),
/// };
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version
    pub x402_version: u32,

    /// Payment scheme used
    pub scheme: String,

    /// Network identifier
    pub network: String,

    /// Scheme-specific payload data
    pub payload: Value,
}

/// EIP-3009 transferWithAuthorization parameters for the "exact" scheme on EVM.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferAuthorization {
    /// Address of the payer (token holder)
    pub from: String,

    /// Address of the payee
    pub to: String,

    /// Amount to transfer (uint256 as string)
    pub value: String,

    /// Timestamp after which the authorization is valid
    pub valid_after: String,

    /// Timestamp before which the authorization is valid
    pub valid_before: String,

    /// Unique nonce for replay protection (32 bytes as hex string)
    pub nonce: String,

    /// EIP-712 signature (r, s, v concatenated as hex string)
    pub signature: String,
}

/// Request body for the facilitator's `/verify` endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Protocol version
    pub x402_version: u32,

    /// The payment payload received from the client
    pub payment_payload: PaymentPayload,

    /// The requirement the payload is checked against
    pub payment_requirements: PaymentRequirements,
}

/// Request body for the facilitator's `/settle` endpoint.
pub type SettleRequest = VerifyRequest;

/// Response from the facilitator's `/verify` endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    /// Whether the payment payload is valid
    pub is_valid: bool,

    /// Address of the payer, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,

    /// Optional reason if invalid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

/// Settlement confirmation.
///
/// Produced once by the facilitator and forwarded once to the client in the
/// result's settlement side channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    /// Whether settlement finalized
    pub success: bool,

    /// Transaction hash; empty in verify-only mode
    #[serde(default)]
    pub transaction: String,

    /// Network the payment settled on
    #[serde(default)]
    pub network: String,

    /// Address of the payer, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,

    /// Reason for a failed settlement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

/// A supported payment kind (scheme + network combination).
///
/// Returned by the facilitator's `/supported` endpoint. `extra` carries facilitator-side
/// metadata such as the fee payer a client must name in a partially-signed transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    /// Protocol version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_version: Option<u32>,

    /// Payment scheme
    pub scheme: String,

    /// Network identifier
    pub network: String,

    /// Facilitator-declared extras
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Response from the facilitator's `/supported` endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SupportedResponse {
    /// List of supported payment kinds
    #[serde(default)]
    pub kinds: Vec<SupportedKind>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requirement() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: "base".to_string(),
            max_amount_required: "10000".to_string(),
            resource: "mcp://tools/weather".to_string(),
            description: Some("Weather API access".to_string()),
            mime_type: Some("application/json".to_string()),
            output_schema: None,
            pay_to: "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb".to_string(),
            max_timeout_seconds: 300,
            asset: USDC_BASE.to_string(),
            extra: Some(json!({"name": "USD Coin", "version": "2"})),
        }
    }

    #[test]
    fn test_requirement_wire_names() {
        let value = serde_json::to_value(requirement()).unwrap();
        assert_eq!(value["maxAmountRequired"], "10000");
        assert_eq!(value["payTo"], "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb");
        assert_eq!(value["mimeType"], "application/json");
        assert_eq!(value["maxTimeoutSeconds"], 300);
        assert!(value.get("outputSchema").is_none());
    }

    #[test]
    fn test_payment_required_response_round_trip() {
        let response = PaymentRequiredResponse {
            x402_version: 1,
            accepts: vec![requirement()],
            error: Some("payment required".to_string()),
        };

        let json = serde_json::to_string(&response).unwrap();
        let deserialized: PaymentRequiredResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, response);
    }

    #[test]
    fn test_requirement_amount() {
        assert_eq!(requirement().amount().unwrap(), 10_000);

        let mut bad = requirement();
        bad.max_amount_required = "ten".to_string();
        assert!(bad.amount().is_err());
    }

    #[test]
    fn test_option_covers_is_case_insensitive_on_asset() {
        let option = ClientPaymentOption::usdc_base();
        assert!(option.covers("base", &USDC_BASE.to_lowercase()));
        assert!(!option.covers("base-sepolia", USDC_BASE));
    }

    #[test]
    fn test_settlement_response_wire_names() {
        let settlement: SettlementResponse = serde_json::from_value(json!({
            "success": false,
            "transaction": "",
            "network": "base",
            "errorReason": "insufficient_funds"
        }))
        .unwrap();
        assert!(!settlement.success);
        assert_eq!(settlement.error_reason.as_deref(), Some("insufficient_funds"));
        assert!(settlement.payer.is_none());
    }

    #[test]
    fn test_transfer_authorization() {
        let auth = TransferAuthorization {
            from: "0xFrom".to_string(),
            to: "0xTo".to_string(),
            value: "1000000".to_string(),
            valid_after: "0".to_string(),
            valid_before: "9999999999".to_string(),
            nonce: "0x1234".to_string(),
            signature: "0xabcd".to_string(),
        };

        let json = serde_json::to_string(&auth).unwrap();
        assert!(json.contains("validAfter"));
        assert!(json.contains("validBefore"));
    }
}
