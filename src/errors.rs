//! Error types for the x402-rpc library.
//!
//! Payment-specific failures are kept apart from transport failures so that callers
//! can tell "the payment was declined" from "the network broke" without string matching.
//! See [`X402Error::category`].

use crate::fallback::SignerFailure;
use thiserror::Error;

/// JSON-RPC error code for invalid method parameters.
pub const RPC_INVALID_PARAMS: i64 = -32602;

/// JSON-RPC error code for internal server errors.
pub const RPC_INTERNAL_ERROR: i64 = -32603;

/// Reserved JSON-RPC error code carrying a payment-required signal.
pub const RPC_PAYMENT_REQUIRED: i64 = 402;

/// Main error type for x402 operations.
#[derive(Error, Debug)]
pub enum X402Error {
    /// Error during HTTP request/response handling
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Transport-level failure that did not come from the HTTP client
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during Base64 encoding/decoding
    #[error("Base64 error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    /// Payment refused by a local policy: budget, rate limit or approval callback
    #[error("Payment rejected by policy: {0}")]
    PolicyRejection(String),

    /// No signer holds an option matching any offered requirement
    #[error("No acceptable payment option: {0}")]
    NoAcceptablePayment(String),

    /// A single signer failed to produce a payload
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Every configured signer failed; failures are kept in signer order
    #[error("All {} signers failed: {}", .0.len(), format_failures(.0))]
    AllSignersFailed(Vec<SignerFailure>),

    /// The retried call still demanded payment
    #[error("Payment rejected by server: {0}")]
    ServerRejectedPayment(String),

    /// Payment verification failed
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Payment settlement failed
    #[error("Settlement failed: {0}")]
    SettlementError(String),

    /// The facilitator could not be reached or answered with garbage
    #[error("Facilitator unavailable: {0}")]
    FacilitatorUnavailable(String),

    /// Invalid payment payload
    #[error("Invalid payment payload: {0}")]
    InvalidPayload(String),

    /// Unsupported payment scheme
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    /// Unsupported network
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// Invalid address format
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Timeout exceeded
    #[error("Timeout exceeded")]
    TimeoutExceeded,

    /// Signature creation failed
    #[error("Signature error: {0}")]
    SignatureError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error parsing URL
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
}

/// Result type alias for x402 operations.
pub type Result<T> = std::result::Result<T, X402Error>;

/// Coarse classification of an [`X402Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Budget, rate limit or approval decline. Never retried automatically.
    PolicyRejection,
    /// No signer/requirement intersection.
    NoAcceptableOption,
    /// Signing failed for one or all signers.
    SigningFailure,
    /// The server demanded payment again after a paid retry.
    ServerRejectedPayment,
    /// The facilitator explicitly rejected the payment.
    Verification,
    /// Settlement did not complete.
    Settlement,
    /// The facilitator itself was unreachable or misbehaving.
    Facilitator,
    /// Network or IO failure on the RPC transport.
    Transport,
    /// Malformed protocol data.
    Protocol,
    /// Misconfiguration.
    Configuration,
}

impl X402Error {
    /// Returns the category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::PolicyRejection(_) => ErrorCategory::PolicyRejection,
            Self::NoAcceptablePayment(_) => ErrorCategory::NoAcceptableOption,
            Self::SigningFailed(_) | Self::AllSignersFailed(_) | Self::SignatureError(_) => {
                ErrorCategory::SigningFailure
            }
            Self::ServerRejectedPayment(_) => ErrorCategory::ServerRejectedPayment,
            Self::VerificationFailed(_) => ErrorCategory::Verification,
            Self::SettlementError(_) => ErrorCategory::Settlement,
            Self::FacilitatorUnavailable(_) => ErrorCategory::Facilitator,
            Self::HttpError(_) | Self::Transport(_) | Self::TimeoutExceeded => {
                ErrorCategory::Transport
            }
            Self::ConfigError(_) => ErrorCategory::Configuration,
            Self::JsonError(_)
            | Self::Base64Error(_)
            | Self::InvalidPayload(_)
            | Self::UnsupportedScheme(_)
            | Self::UnsupportedNetwork(_)
            | Self::InvalidAddress(_)
            | Self::InvalidAmount(_)
            | Self::UrlParseError(_) => ErrorCategory::Protocol,
        }
    }

    /// Returns true for failures of the payment flow itself, as opposed to
    /// transport, protocol or configuration trouble.
    pub fn is_payment_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::PolicyRejection
                | ErrorCategory::NoAcceptableOption
                | ErrorCategory::SigningFailure
                | ErrorCategory::ServerRejectedPayment
                | ErrorCategory::Verification
                | ErrorCategory::Settlement
        )
    }

    /// Returns the JSON-RPC error code a server should answer with for this error.
    pub fn rpc_code(&self) -> i64 {
        match self.category() {
            ErrorCategory::Verification | ErrorCategory::ServerRejectedPayment => {
                RPC_PAYMENT_REQUIRED
            }
            ErrorCategory::Protocol
            | ErrorCategory::NoAcceptableOption
            | ErrorCategory::PolicyRejection => RPC_INVALID_PARAMS,
            _ => RPC_INTERNAL_ERROR,
        }
    }
}

fn format_failures(failures: &[SignerFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ethers::core::types::SignatureError> for X402Error {
    fn from(err: ethers::core::types::SignatureError) -> Self {
        X402Error::SignatureError(err.to_string())
    }
}

impl From<ethers::signers::WalletError> for X402Error {
    fn from(err: ethers::signers::WalletError) -> Self {
        X402Error::SignatureError(err.to_string())
    }
}
