//! # x402-rpc
//!
//! Per-call micropayments for JSON-RPC tool servers, following the x402 protocol.
//!
//! x402 gives the HTTP 402 "Payment Required" status a concrete meaning: the server answers
//! with the payment options it accepts, the client signs one and retries. This crate carries
//! the same exchange inside JSON-RPC, so tool calls can be priced individually regardless of
//! the transport underneath.
//!
//! ## Features
//!
//! - **Client Support**: [`X402Client`] pays on demand and retries once, with multi-signer
//!   fallback, budget limits and an approval callback
//! - **Server Support**: [`PaymentMiddleware`] wraps any JSON-RPC handler and charges for
//!   selected tools through a facilitator
//! - **EVM Chains**: EIP-3009 `exact` payments signed locally with [`EvmSigner`]
//! - **Extensible**: bring your own [`PaymentSigner`], [`Transport`] or [`Facilitator`]
//!
//! ## Quick Start
//!
//! ### Client Example
//!
//! ```rust,no_run
//! use x402_rpc::client::{X402Client, X402ClientConfig};
//! use x402_rpc::signers::EvmSigner;
//! use x402_rpc::transport::HttpTransport;
//! use x402_rpc::types::ClientPaymentOption;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let signer = EvmSigner::new("0xYOUR_PRIVATE_KEY")?
//!     .with_option(ClientPaymentOption::usdc_base().with_max_amount("100000"));
//!
//! let client = X402Client::new(
//!     HttpTransport::new("https://tools.example.com/rpc")?,
//!     X402ClientConfig::new(signer),
//! );
//!
//! let paid = client.call_tool("weather", json!({"city": "Lisbon"})).await?;
//! println!("Result: {:?}", paid.result());
//! # Ok(())
//! # }
//! ```
//!
//! ### Server Example
//!
//! ```rust,no_run
//! use x402_rpc::facilitator::HttpFacilitator;
//! use x402_rpc::jsonrpc::JsonRpcResponse;
//! use x402_rpc::server::{handler_fn, PaymentConfig, PaymentMiddleware};
//! use serde_json::json;
//!
//! # fn example() -> x402_rpc::Result<()> {
//! let tools = handler_fn(|request| async move {
//!     JsonRpcResponse::success(request.id, json!({"content": []}))
//! });
//!
//! let facilitator = HttpFacilitator::new("https://x402.org/facilitator")?;
//! let price = PaymentConfig::usdc_base("0xYOUR_ADDRESS", 0.01, "Weather lookup");
//! let middleware = PaymentMiddleware::new(tools, facilitator).protect_priced("weather", &price)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Protocol Overview
//!
//! 1. **Client calls a tool**: a plain JSON-RPC request
//! 2. **Server demands payment**: JSON-RPC error `402` whose `data` lists accepted requirements
//! 3. **Client signs a payment**: picks a requirement and a signer, creates the payload
//! 4. **Client retries**: same request with the payload in `params._meta["x402/payment"]`
//! 5. **Server verifies and settles**: through the facilitator, then runs the tool
//! 6. **Server answers**: the result carries `_meta["x402/payment-response"]`
//!
//! ## Payment Schemes
//!
//! ### Exact Scheme
//!
//! The "exact" scheme requires the payer to authorize exactly the amount specified in
//! `maxAmountRequired`. It uses EIP-3009 `transferWithAuthorization` for gasless transfers,
//! meaning the payer doesn't need ETH for gas fees.
//!
//! ## References
//!
//! - [x402 Specification](https://github.com/coinbase/x402)
//! - [EIP-3009](https://eips.ethereum.org/EIPS/eip-3009)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod budget;
pub mod client;
pub mod errors;
pub mod events;
pub mod facilitator;
pub mod fallback;
pub mod jsonrpc;
pub mod selector;
pub mod server;
pub mod signers;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use budget::{BudgetConfig, BudgetManager, BudgetMetrics};
pub use client::{PaidResponse, X402Client, X402ClientConfig};
pub use errors::{ErrorCategory, Result, X402Error};
pub use events::{PaymentEvent, PaymentEventKind, PaymentHooks};
pub use facilitator::{Facilitator, HttpFacilitator, SupportedCache};
pub use fallback::{FallbackEngine, SelectedPayment, SignerFailure, SignerFailureKind};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use selector::select_payment;
pub use server::{handler_fn, MiddlewareConfig, PaymentConfig, PaymentMiddleware, RpcHandler};
pub use signers::{EvmSigner, PaymentSigner};
pub use transport::{HttpTransport, Transport};
pub use types::{
    ClientPaymentOption, PaymentPayload, PaymentRequiredResponse, PaymentRequirements,
    SettlementResponse, SupportedKind, SupportedResponse, TransferAuthorization,
    VerificationResponse, X402_VERSION,
};
