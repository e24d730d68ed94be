//! Example paid tool server using Axum.
//!
//! Serves JSON-RPC on `/rpc` with two tools: `weather`, which costs $0.01 in USDC, and
//! `echo`, which is free.
//!
//! Run with:
//! ```bash
//! cargo run --example server
//! ```
//!
//! Environment variables (a `.env` file is read if present):
//! - PAY_TO: Address to receive payments
//! - FACILITATOR_URL: URL of the facilitator service
//! - NETWORK: "base" or "base-sepolia" (default: base-sepolia)
//! - VERIFY_ONLY: set to "true" to skip settlement
//! - PORT: Server port (default: 3000)

use anyhow::Context;
use axum::{extract::State, response::IntoResponse, routing::{get, post}, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use x402_rpc::facilitator::HttpFacilitator;
use x402_rpc::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, TOOLS_CALL};
use x402_rpc::server::{handler_fn, MiddlewareConfig, PaymentConfig, PaymentMiddleware, RpcHandler};
use x402_rpc::types::{SCHEME_EXACT, USDC_BASE, USDC_BASE_SEPOLIA};

/// The tools themselves; payment is handled before these run.
async fn tools(request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone();
    match (request.method.as_str(), request.target()) {
        ("tools/list", _) => JsonRpcResponse::success(
            id,
            json!({"tools": [
                {"name": "weather", "description": "Current weather ($0.01)"},
                {"name": "echo", "description": "Echo the arguments (free)"},
            ]}),
        ),
        (TOOLS_CALL, "weather") => JsonRpcResponse::success(
            id,
            json!({"content": [{"type": "text", "text": json!({
                "location": "San Francisco",
                "temperature": 68,
                "conditions": "Sunny",
                "humidity": 65,
            }).to_string()}]}),
        ),
        (TOOLS_CALL, "echo") => {
            let arguments = request
                .params
                .as_ref()
                .and_then(|p| p.get("arguments"))
                .cloned()
                .unwrap_or(Value::Null);
            JsonRpcResponse::success(
                id,
                json!({"content": [{"type": "text", "text": arguments.to_string()}]}),
            )
        }
        (_, target) => JsonRpcResponse::failure(
            id,
            JsonRpcError::new(-32601, format!("unknown method or tool: {}", target)),
        ),
    }
}

async fn rpc_handler(
    State(handler): State<Arc<dyn RpcHandler>>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    Json(handler.handle(request).await)
}

/// Health check endpoint (no payment required).
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "protocol": "x402",
        "version": 1,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let pay_to = std::env::var("PAY_TO")
        .unwrap_or_else(|_| "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string());
    let facilitator_url = std::env::var("FACILITATOR_URL")
        .unwrap_or_else(|_| "https://x402.org/facilitator".to_string());
    let network = std::env::var("NETWORK").unwrap_or_else(|_| "base-sepolia".to_string());
    let verify_only = std::env::var("VERIFY_ONLY").map(|v| v == "true").unwrap_or(false);
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .context("PORT must be a port number")?;

    let asset = match network.as_str() {
        "base" => USDC_BASE,
        "base-sepolia" => USDC_BASE_SEPOLIA,
        other => anyhow::bail!("no USDC address known for network {}", other),
    };

    let price =
        PaymentConfig::new(&pay_to, asset, 6, &network, SCHEME_EXACT, 0.01, "Weather lookup")
            .with_timeout(300)
            .with_token_metadata("USDC", "2");

    let facilitator = HttpFacilitator::new(&facilitator_url)?;
    let middleware = PaymentMiddleware::new(handler_fn(tools), facilitator)
        .with_config(MiddlewareConfig::new().with_verify_only(verify_only))
        .protect_priced("weather", &price)?;

    if let Err(e) = middleware.refresh_supported().await {
        warn!(error = %e, "could not load facilitator supported kinds");
    }

    info!(
        pay_to = %pay_to,
        facilitator = %facilitator_url,
        network = %network,
        verify_only,
        "starting paid tool server"
    );

    let handler: Arc<dyn RpcHandler> = Arc::new(middleware);
    let app = Router::new()
        .route("/rpc", post(rpc_handler))
        .route("/health", get(health_handler))
        .with_state(handler)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
