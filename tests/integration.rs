//! Integration tests for the x402-rpc library.
//!
//! These tests run the paying client against the payment middleware end to end, both
//! in-process and over real HTTP with axum standing in for the tool server and the
//! facilitator.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;
use x402_rpc::{
    budget::{BudgetConfig, BudgetManager},
    client::{X402Client, X402ClientConfig},
    errors::{ErrorCategory, Result, X402Error, RPC_INTERNAL_ERROR},
    events::{PaymentEventKind, PaymentHooks},
    facilitator::{Facilitator, HttpFacilitator},
    jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse},
    server::{handler_fn, MiddlewareConfig, PaymentMiddleware, RpcHandler},
    signers::{EvmSigner, PaymentSigner},
    transport::{HttpTransport, Transport},
    types::{
        ClientPaymentOption, PaymentPayload, PaymentRequiredResponse, PaymentRequirements,
        SettleRequest, SettlementResponse, SupportedKind, SupportedResponse, VerificationResponse,
        VerifyRequest, USDC_BASE_SEPOLIA,
    },
    utils::encode_header,
};

const PAYER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const PAYER_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
const SECOND_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
const PAY_TO: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";

fn requirement(amount: &str) -> PaymentRequirements {
    PaymentRequirements {
        scheme: "exact".to_string(),
        network: "base-sepolia".to_string(),
        max_amount_required: amount.to_string(),
        resource: String::new(),
        description: Some("Search the index".to_string()),
        mime_type: None,
        output_schema: None,
        pay_to: PAY_TO.to_string(),
        max_timeout_seconds: 120,
        asset: USDC_BASE_SEPOLIA.to_string(),
        extra: Some(json!({"name": "USDC", "version": "2"})),
    }
}

fn payer() -> EvmSigner {
    EvmSigner::new(PAYER_KEY)
        .unwrap()
        .with_option(ClientPaymentOption::usdc_base_sepolia())
}

fn tools() -> impl RpcHandler {
    handler_fn(|request: JsonRpcRequest| async move {
        let text = format!("called {}", request.target());
        JsonRpcResponse::success(request.id, json!({"content": [{"type": "text", "text": text}]}))
    })
}

#[derive(Clone, Default)]
struct MockFacilitator {
    reject: Option<String>,
    fail_settle: bool,
    verified: Arc<Mutex<Vec<PaymentPayload>>>,
    settles: Arc<AtomicUsize>,
}

#[async_trait]
impl Facilitator for MockFacilitator {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        _requirements: &PaymentRequirements,
    ) -> Result<VerificationResponse> {
        self.verified.lock().unwrap().push(payload.clone());
        Ok(VerificationResponse {
            is_valid: self.reject.is_none(),
            payer: payload.payload["authorization"]["from"]
                .as_str()
                .map(str::to_string),
            invalid_reason: self.reject.clone(),
        })
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        _requirements: &PaymentRequirements,
    ) -> Result<SettlementResponse> {
        self.settles.fetch_add(1, Ordering::SeqCst);
        Ok(SettlementResponse {
            success: !self.fail_settle,
            transaction: "0xfeed".to_string(),
            network: payload.network.clone(),
            payer: None,
            error_reason: self.fail_settle.then(|| "authorization expired".to_string()),
        })
    }

    async fn supported(&self) -> Result<SupportedResponse> {
        Ok(SupportedResponse::default())
    }
}

fn gateway(facilitator: MockFacilitator, amount: &str) -> Arc<dyn RpcHandler> {
    Arc::new(
        PaymentMiddleware::new(tools(), facilitator).protect("search", vec![requirement(amount)]),
    )
}

/// Delivers requests straight to a handler and counts them.
struct InProcess {
    handler: Arc<dyn RpcHandler>,
    sent: AtomicUsize,
}

impl InProcess {
    fn new(handler: Arc<dyn RpcHandler>) -> Self {
        Self {
            handler,
            sent: AtomicUsize::new(0),
        }
    }

    fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for InProcess {
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(self.handler.handle(request).await)
    }
}

/// Never answers.
struct Stalled;

#[async_trait]
impl Transport for Stalled {
    async fn send(&self, _request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(X402Error::Transport("unreachable".to_string()))
    }
}

/// Answers unpaid requests through a handler and never answers paid ones.
struct StallsWhenPaid {
    gateway: InProcess,
}

#[async_trait]
impl Transport for StallsWhenPaid {
    async fn send(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        if request.payment()?.is_some() {
            self.gateway.sent.fetch_add(1, Ordering::SeqCst);
            return Stalled.send(request).await;
        }
        self.gateway.send(request).await
    }
}

/// Signer that declares an option but only counts sign calls.
struct CountingSigner {
    option: ClientPaymentOption,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl PaymentSigner for CountingSigner {
    async fn sign_payment(&self, requirement: &PaymentRequirements) -> Result<PaymentPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentPayload {
            x402_version: 1,
            scheme: requirement.scheme.clone(),
            network: requirement.network.clone(),
            payload: json!({}),
        })
    }
    fn address(&self) -> String {
        "0xcounting".to_string()
    }
    fn supports_network(&self, network: &str) -> bool {
        self.option.network == network
    }
    fn has_asset(&self, asset: &str, network: &str) -> bool {
        self.option.covers(network, asset)
    }
    fn payment_option(&self, network: &str, asset: &str) -> Option<ClientPaymentOption> {
        self.option.covers(network, asset).then(|| self.option.clone())
    }
    fn priority(&self) -> i32 {
        0
    }
}

#[tokio::test]
async fn test_no_matching_signer_fails_without_retry() {
    let polygon_only = EvmSigner::new(PAYER_KEY)
        .unwrap()
        .with_option(ClientPaymentOption::new("exact", "polygon", USDC_BASE_SEPOLIA));
    let client = X402Client::new(
        InProcess::new(gateway(MockFacilitator::default(), "1000")),
        X402ClientConfig::new(polygon_only),
    );

    let err = assert_err!(client.call_tool("search", json!({"q": "rust"})).await);
    assert!(matches!(err, X402Error::NoAcceptablePayment(_)));
    assert_eq!(err.category(), ErrorCategory::NoAcceptableOption);
    assert_eq!(client.transport().sent(), 1);
}

#[tokio::test]
async fn test_pays_and_retries_once() {
    let facilitator = MockFacilitator::default();
    let client = X402Client::new(
        InProcess::new(gateway(facilitator.clone(), "1000")),
        X402ClientConfig::new(payer()),
    );

    let paid = assert_ok!(client.call_tool("search", json!({"q": "rust"})).await);

    assert_eq!(client.transport().sent(), 2);
    assert!(paid.was_paid());
    let settlement = paid.settlement.clone().expect("settlement stamped on result");
    assert!(settlement.success);
    assert_eq!(settlement.transaction, "0xfeed");
    assert_eq!(paid.result().unwrap()["content"][0]["text"], "called search");

    let payment = paid.payment.clone().unwrap();
    assert_eq!(payment.amount, 1000);
    assert_eq!(payment.requirement.resource, "mcp://tools/search");

    let verified = facilitator.verified.lock().unwrap();
    assert_eq!(verified.len(), 1);
    assert_eq!(verified[0].payload["authorization"]["from"], PAYER_ADDRESS);
    assert_eq!(verified[0].payload["authorization"]["value"], "1000");
    assert_eq!(facilitator.settles.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_budget_rejects_before_signing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let signer = CountingSigner {
        option: ClientPaymentOption::usdc_base_sepolia(),
        calls: calls.clone(),
    };
    let budget = Arc::new(BudgetManager::new(
        BudgetConfig::new().with_max_payment_amount(500),
    ));
    let client = X402Client::new(
        InProcess::new(gateway(MockFacilitator::default(), "1000")),
        X402ClientConfig::new(signer).with_budget(budget),
    );

    let err = assert_err!(client.call_tool("search", json!({})).await);
    assert!(matches!(err, X402Error::PolicyRejection(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(client.transport().sent(), 1);
    assert_eq!(client.budget_metrics().unwrap().payment_count, 0);
}

#[tokio::test]
async fn test_falls_back_to_second_signer() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let hooks = PaymentHooks::new().on_all(move |event| sink.lock().unwrap().push(event.kind));

    let first = EvmSigner::new(PAYER_KEY)
        .unwrap()
        .with_priority(1)
        .with_option(ClientPaymentOption::new("exact", "polygon", USDC_BASE_SEPOLIA));
    let second = EvmSigner::new(SECOND_KEY)
        .unwrap()
        .with_priority(2)
        .with_option(ClientPaymentOption::usdc_base_sepolia());
    let second_address = second.address();

    let client = X402Client::new(
        InProcess::new(gateway(MockFacilitator::default(), "1000")),
        X402ClientConfig::new(first)
            .with_signer(Arc::new(second))
            .with_hooks(hooks),
    );

    let paid = assert_ok!(client.call_tool("search", json!({})).await);
    let payment = paid.payment.clone().unwrap();
    assert_eq!(payment.signer_index, 1);
    assert_eq!(payment.signer_address, second_address);
    assert_eq!(
        payment.payload.payload["authorization"]["from"],
        second_address.as_str()
    );

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            PaymentEventKind::Attempt,
            PaymentEventKind::SignerAttempt,
            PaymentEventKind::SignerFailure,
            PaymentEventKind::SignerAttempt,
            PaymentEventKind::SignerSuccess,
            PaymentEventKind::Success,
        ]
    );
}

#[tokio::test]
async fn test_second_demand_is_server_rejection() {
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = failures.clone();
    let hooks = PaymentHooks::new().on(PaymentEventKind::Failure, move |event| {
        sink.lock().unwrap().push(event.error.clone())
    });

    let facilitator = MockFacilitator {
        reject: Some("invalid_exact_evm_payload_signature".to_string()),
        ..Default::default()
    };
    let budget = Arc::new(BudgetManager::new(BudgetConfig::new()));
    let client = X402Client::new(
        InProcess::new(gateway(facilitator.clone(), "1000")),
        X402ClientConfig::new(payer())
            .with_budget(budget)
            .with_hooks(hooks),
    );

    let err = assert_err!(client.call_tool("search", json!({})).await);
    match err {
        X402Error::ServerRejectedPayment(reason) => {
            assert_eq!(reason, "invalid_exact_evm_payload_signature")
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(client.transport().sent(), 2);
    assert_eq!(facilitator.settles.load(Ordering::SeqCst), 0);

    let metrics = client.budget_metrics().unwrap();
    assert_eq!(metrics.payment_count, 1);
    assert_eq!(metrics.total_spent, 1000);
    assert_eq!(failures.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_settlement_is_internal_error() {
    let facilitator = MockFacilitator {
        fail_settle: true,
        ..Default::default()
    };
    let client = X402Client::new(
        InProcess::new(gateway(facilitator, "1000")),
        X402ClientConfig::new(payer()),
    );

    let paid = assert_ok!(client.call_tool("search", json!({})).await);
    assert!(paid.was_paid());
    assert!(paid.settlement.is_none());
    assert_eq!(paid.response.error.unwrap().code, RPC_INTERNAL_ERROR);
}

#[tokio::test]
async fn test_unsuccessful_settlement_still_returned() {
    let failures = Arc::new(AtomicUsize::new(0));
    let counter = failures.clone();
    let hooks = PaymentHooks::new().on(PaymentEventKind::Failure, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // A server that stamps a failed settlement on an otherwise good result.
    let server: Arc<dyn RpcHandler> = Arc::new(handler_fn(|request: JsonRpcRequest| async move {
        if request.payment().ok().flatten().is_none() {
            let required = PaymentRequiredResponse {
                x402_version: 1,
                accepts: vec![requirement("250")],
                error: None,
            };
            let error = JsonRpcError::payment_required(&required).unwrap();
            return JsonRpcResponse::failure(request.id, error);
        }
        let failed = SettlementResponse {
            success: false,
            transaction: String::new(),
            network: "base-sepolia".to_string(),
            payer: None,
            error_reason: Some("insufficient_funds".to_string()),
        };
        JsonRpcResponse::success(request.id, json!({"content": []}))
            .with_settlement(&failed)
            .unwrap()
    }));

    let client = X402Client::new(
        InProcess::new(server),
        X402ClientConfig::new(payer()).with_hooks(hooks),
    );

    let paid = assert_ok!(client.call_tool("search", json!({})).await);
    assert!(!paid.settlement.clone().unwrap().success);
    assert!(paid.result().is_some());
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_free_tool_passes_through() {
    let client = X402Client::new(
        InProcess::new(gateway(MockFacilitator::default(), "1000")),
        X402ClientConfig::new(payer()),
    );

    let paid = assert_ok!(client.call_tool("status", json!({})).await);
    assert!(!paid.was_paid());
    assert_eq!(paid.result().unwrap()["content"][0]["text"], "called status");
    assert_eq!(client.transport().sent(), 1);
}

#[tokio::test]
async fn test_approval_declines() {
    let client = X402Client::new(
        InProcess::new(gateway(MockFacilitator::default(), "1000")),
        X402ClientConfig::new(payer()).with_approval(|req| req.resource != "mcp://tools/search"),
    );

    let err = assert_err!(client.call_tool("search", json!({})).await);
    assert!(matches!(err, X402Error::PolicyRejection(_)));
    assert!(err.is_payment_error());
    assert_eq!(client.transport().sent(), 1);
}

#[tokio::test]
async fn test_leg_timeout() {
    let client = X402Client::new(
        Stalled,
        X402ClientConfig::new(payer()).with_timeout(Duration::from_millis(20)),
    );

    let err = assert_err!(client.call_tool("search", json!({})).await);
    assert!(matches!(err, X402Error::TimeoutExceeded));
}

#[tokio::test]
async fn test_timed_out_retry_counts_against_budget() {
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = failures.clone();
    let budget = Arc::new(BudgetManager::new(
        BudgetConfig::new().with_max_hourly_spend(1500),
    ));
    let client = X402Client::new(
        StallsWhenPaid {
            gateway: InProcess::new(gateway(MockFacilitator::default(), "1000")),
        },
        X402ClientConfig::new(payer())
            .with_budget(budget)
            .with_timeout(Duration::from_millis(50))
            .with_hooks(PaymentHooks::new().on(PaymentEventKind::Failure, move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })),
    );

    let err = assert_err!(client.call_tool("search", json!({})).await);
    assert!(matches!(err, X402Error::TimeoutExceeded));
    assert_eq!(client.transport().gateway.sent(), 2);
    assert_eq!(failures.load(Ordering::SeqCst), 1);

    let metrics = client.budget_metrics().unwrap();
    assert_eq!(metrics.payment_count, 1);
    assert_eq!(metrics.hourly_spent, 1000);

    let err = assert_err!(client.call_tool("search", json!({})).await);
    assert!(matches!(err, X402Error::PolicyRejection(_)));
    assert_eq!(client.transport().gateway.sent(), 3);
    assert_eq!(client.budget_metrics().unwrap().hourly_spent, 1000);
}

#[tokio::test]
async fn test_verify_only_mode() {
    let facilitator = MockFacilitator::default();
    let middleware = PaymentMiddleware::new(tools(), facilitator.clone())
        .with_config(MiddlewareConfig::new().with_verify_only(true))
        .protect("search", vec![requirement("1000")]);
    let client = X402Client::new(
        InProcess::new(Arc::new(middleware)),
        X402ClientConfig::new(payer()),
    );

    let paid = assert_ok!(client.call_tool("search", json!({})).await);
    let settlement = paid.settlement.clone().unwrap();
    assert!(settlement.success);
    assert!(settlement.transaction.is_empty());
    assert_eq!(settlement.payer.as_deref(), Some(PAYER_ADDRESS));
    assert_eq!(facilitator.settles.load(Ordering::SeqCst), 0);
}

#[test]
fn test_requirement_survives_payment_required_signal() {
    let mut original = requirement("1000");
    original.resource = "mcp://tools/search".to_string();
    original.mime_type = Some("application/json".to_string());
    original.output_schema = Some(json!({"type": "object"}));

    let required = PaymentRequiredResponse {
        x402_version: 1,
        accepts: vec![original.clone()],
        error: None,
    };
    let response =
        JsonRpcResponse::failure(json!(3), JsonRpcError::payment_required(&required).unwrap());
    let wire = serde_json::to_string(&response).unwrap();

    let parsed: JsonRpcResponse = serde_json::from_str(&wire).unwrap();
    let required = parsed.payment_required().unwrap().unwrap();
    assert_eq!(required.accepts, vec![original]);
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn facilitator_app() -> Router {
    async fn verify(Json(request): Json<VerifyRequest>) -> Json<VerificationResponse> {
        let valid = request.payment_payload.network == request.payment_requirements.network;
        Json(VerificationResponse {
            is_valid: valid,
            payer: request.payment_payload.payload["authorization"]["from"]
                .as_str()
                .map(str::to_string),
            invalid_reason: (!valid).then(|| "network_mismatch".to_string()),
        })
    }

    async fn settle(Json(request): Json<SettleRequest>) -> Json<SettlementResponse> {
        Json(SettlementResponse {
            success: true,
            transaction: "0xabc123".to_string(),
            network: request.payment_requirements.network,
            payer: None,
            error_reason: None,
        })
    }

    async fn supported() -> Json<SupportedResponse> {
        Json(SupportedResponse {
            kinds: vec![SupportedKind {
                x402_version: Some(1),
                scheme: "exact".to_string(),
                network: "base-sepolia".to_string(),
                extra: Some(json!({"feePayer": "0x000000000000000000000000000000000000fee1"})),
            }],
        })
    }

    Router::new()
        .route("/verify", post(verify))
        .route("/settle", post(settle))
        .route("/supported", get(supported))
}

async fn rpc(
    State(handler): State<Arc<dyn RpcHandler>>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    Json(handler.handle(request).await)
}

#[tokio::test]
async fn test_http_facilitator_round_trip() {
    let url = serve(facilitator_app()).await;
    let facilitator = assert_ok!(HttpFacilitator::new(&format!("{}/", url)));

    let mut req = requirement("1000");
    req.resource = "mcp://tools/search".to_string();
    let payload = assert_ok!(payer().sign_payment(&req).await);

    let verification = assert_ok!(facilitator.verify(&payload, &req).await);
    assert!(verification.is_valid);
    assert_eq!(verification.payer.as_deref(), Some(PAYER_ADDRESS));

    let settlement = assert_ok!(facilitator.settle(&payload, &req).await);
    assert!(settlement.success);
    assert_eq!(settlement.transaction, "0xabc123");
    assert_eq!(settlement.network, "base-sepolia");

    let supported = assert_ok!(facilitator.supported().await);
    assert_eq!(supported.kinds.len(), 1);
}

#[tokio::test]
async fn test_http_facilitator_unavailable() {
    let app = Router::new().route(
        "/verify",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let url = serve(app).await;
    let facilitator = HttpFacilitator::new(&url).unwrap();

    let mut req = requirement("1000");
    req.resource = "mcp://tools/search".to_string();
    let payload = payer().sign_payment(&req).await.unwrap();

    let err = assert_err!(facilitator.verify(&payload, &req).await);
    assert!(matches!(err, X402Error::FacilitatorUnavailable(_)));
}

#[tokio::test]
async fn test_end_to_end_over_http() {
    let facilitator_url = serve(facilitator_app()).await;
    let facilitator = HttpFacilitator::new(&facilitator_url).unwrap();
    let middleware =
        PaymentMiddleware::new(tools(), facilitator).protect("search", vec![requirement("1000")]);
    assert_ok!(middleware.refresh_supported().await);

    let accepts = middleware.requirements_for("search").unwrap();
    assert_eq!(
        accepts[0].extra.as_ref().unwrap()["feePayer"],
        "0x000000000000000000000000000000000000fee1"
    );
    assert_eq!(accepts[0].extra.as_ref().unwrap()["name"], "USDC");

    let handler: Arc<dyn RpcHandler> = Arc::new(middleware);
    let server_url = serve(Router::new().route("/rpc", post(rpc)).with_state(handler)).await;

    let client = X402Client::new(
        HttpTransport::new(&format!("{}/rpc", server_url)).unwrap(),
        X402ClientConfig::new(payer()),
    );

    let paid = assert_ok!(client.call_tool("search", json!({"q": "x402"})).await);
    let settlement = paid.settlement.clone().unwrap();
    assert!(settlement.success);
    assert_eq!(settlement.transaction, "0xabc123");
    assert_eq!(paid.result().unwrap()["content"][0]["text"], "called search");
}

#[tokio::test]
async fn test_http_402_with_header() {
    async fn header_gateway(Json(request): Json<JsonRpcRequest>) -> Response {
        if request.payment().ok().flatten().is_none() {
            let required = PaymentRequiredResponse {
                x402_version: 1,
                accepts: vec![requirement("5000")],
                error: None,
            };
            let encoded = encode_header(&required).unwrap();
            return (StatusCode::PAYMENT_REQUIRED, [("payment-required", encoded)], "")
                .into_response();
        }
        Json(JsonRpcResponse::success(request.id, json!({"paid": true}))).into_response()
    }

    let url = serve(Router::new().route("/rpc", post(header_gateway))).await;
    let client = X402Client::new(
        HttpTransport::new(&format!("{}/rpc", url)).unwrap(),
        X402ClientConfig::new(payer()),
    );

    let paid = assert_ok!(client.call_tool("search", json!({})).await);
    assert_eq!(paid.payment.clone().unwrap().amount, 5000);
    assert!(paid.settlement.is_none());
    assert_eq!(paid.result().unwrap()["paid"], true);
}

#[tokio::test]
async fn test_router_answers_payment_required() {
    let handler = gateway(MockFacilitator::default(), "1000");
    let app = Router::new().route("/rpc", post(rpc)).with_state(handler);

    let body = serde_json::to_vec(&JsonRpcRequest::tool_call(9, "search", json!({}))).unwrap();
    let request = http::Request::builder()
        .method("POST")
        .uri("/rpc")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let response: JsonRpcResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(response.id, json!(9));
    let required = response.payment_required().unwrap().unwrap();
    assert_eq!(required.accepts[0].resource, "mcp://tools/search");
    assert_eq!(required.accepts[0].mime_type.as_deref(), Some("application/json"));
}
