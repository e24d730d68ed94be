//! Example paying client.
//!
//! Calls the `weather` tool on a paid JSON-RPC server, paying on demand.
//!
//! Run with:
//! ```bash
//! cargo run --example client
//! ```
//!
//! Environment variables (a `.env` file is read if present):
//! - PRIVATE_KEY: Your private key for signing payments
//! - FALLBACK_PRIVATE_KEY: Optional second signer tried when the first cannot pay
//! - RPC_ENDPOINT: The JSON-RPC endpoint (default: http://localhost:3000/rpc)
//! - MAX_PAYMENT: Largest single payment in USDC base units (default: 100000)

use anyhow::Context;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use x402_rpc::budget::{BudgetConfig, BudgetManager};
use x402_rpc::client::{X402Client, X402ClientConfig};
use x402_rpc::events::{PaymentEventKind, PaymentHooks};
use x402_rpc::signers::EvmSigner;
use x402_rpc::transport::HttpTransport;
use x402_rpc::types::ClientPaymentOption;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let private_key = std::env::var("PRIVATE_KEY").unwrap_or_else(|_| {
        warn!("no PRIVATE_KEY set, using example key (DO NOT USE IN PRODUCTION)");
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string()
    });
    let endpoint = std::env::var("RPC_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:3000/rpc".to_string());
    let max_payment: u128 = std::env::var("MAX_PAYMENT")
        .unwrap_or_else(|_| "100000".to_string())
        .parse()
        .context("MAX_PAYMENT must be an integer")?;

    let signer = EvmSigner::new(&private_key)?
        .with_option(ClientPaymentOption::usdc_base_sepolia().with_priority(1))
        .with_option(ClientPaymentOption::usdc_base().with_priority(2));

    let budget = Arc::new(BudgetManager::new(
        BudgetConfig::new()
            .with_max_payment_amount(max_payment)
            .with_max_hourly_spend(max_payment * 10)
            .with_max_payments_per_minute(10),
    ));

    let hooks = PaymentHooks::new()
        .on(PaymentEventKind::Attempt, |e| {
            info!(amount = ?e.amount, resource = ?e.resource, "server asked for payment")
        })
        .on(PaymentEventKind::SignerFailure, |e| {
            warn!(signer = ?e.signer_address, error = ?e.error, "signer could not pay")
        })
        .on(PaymentEventKind::Success, |e| {
            info!(amount = ?e.amount, network = ?e.network, "payment settled")
        })
        .on(PaymentEventKind::Failure, |e| warn!(error = ?e.error, "payment failed"));

    let mut config = X402ClientConfig::new(signer)
        .with_budget(budget)
        .with_hooks(hooks)
        .with_timeout(Duration::from_secs(60));

    if let Ok(fallback_key) = std::env::var("FALLBACK_PRIVATE_KEY") {
        let fallback = EvmSigner::new(&fallback_key)?
            .with_priority(2)
            .with_option(ClientPaymentOption::usdc_base_sepolia());
        config = config.with_signer(Arc::new(fallback));
    }

    let client = X402Client::new(HttpTransport::new(&endpoint)?, config);

    info!(endpoint = %endpoint, "calling weather tool");
    let paid = client.call_tool("weather", json!({"city": "San Francisco"})).await?;

    if let Some(error) = &paid.response.error {
        anyhow::bail!("tool call failed ({}): {}", error.code, error.message);
    }
    if let Some(settlement) = &paid.settlement {
        println!("Payment settled: {}", serde_json::to_string_pretty(settlement)?);
    }
    if let Some(result) = paid.result() {
        println!("Result:\n{}", serde_json::to_string_pretty(result)?);
    }
    if let Some(metrics) = client.budget_metrics() {
        println!(
            "Spent {} in {} payment(s) this hour",
            metrics.hourly_spent, metrics.payment_count
        );
    }

    Ok(())
}
