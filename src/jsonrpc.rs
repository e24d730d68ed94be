//! JSON-RPC envelope and the x402 side channels carried inside it.
//!
//! Payment data travels out of band in the `_meta` extension object:
//!
//! - requests carry the [`PaymentPayload`] under `params._meta["x402/payment"]`
//! - results carry the [`SettlementResponse`] under `result._meta["x402/payment-response"]`
//! - a payment demand is a JSON-RPC error with code [`RPC_PAYMENT_REQUIRED`] whose
//!   `data` is a [`PaymentRequiredResponse`]
//!
//! Values are validated into typed structs here, at the boundary, before anything
//! else looks at them.

use crate::errors::{
    Result, X402Error, RPC_INTERNAL_ERROR, RPC_INVALID_PARAMS, RPC_PAYMENT_REQUIRED,
};
use crate::types::{PaymentPayload, PaymentRequiredResponse, SettlementResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Name of the extension object holding side-channel metadata.
pub const META_KEY: &str = "_meta";

/// Metadata key carrying the payment payload on a request.
pub const PAYMENT_META_KEY: &str = "x402/payment";

/// Metadata key carrying the settlement confirmation on a result.
pub const PAYMENT_RESPONSE_META_KEY: &str = "x402/payment-response";

/// Method name of a tool invocation.
pub const TOOLS_CALL: &str = "tools/call";

/// A JSON-RPC request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcRequest {
    /// Always "2.0"
    pub jsonrpc: String,

    /// Request id, echoed by the response
    #[serde(default)]
    pub id: Value,

    /// Method name
    pub method: String,

    /// Method parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Creates a request.
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Creates a `tools/call` request for `name` with `arguments`.
    ///
    /// # Examples
    ///
    /// ```
    /// use x402_rpc::jsonrpc::JsonRpcRequest;
    /// use serde_json::json;
    ///
    /// let request = JsonRpcRequest::tool_call(1, "weather", json!({"city": "Lisbon"}));
    /// assert_eq!(request.target(), "weather");
    /// ```
    pub fn tool_call(id: impl Into<Value>, name: &str, arguments: Value) -> Self {
        Self::new(
            id,
            TOOLS_CALL,
            Some(json!({ "name": name, "arguments": arguments })),
        )
    }

    /// Returns what this call targets: the tool name for `tools/call`, otherwise the method.
    pub fn target(&self) -> &str {
        if self.method == TOOLS_CALL {
            if let Some(name) = self
                .params
                .as_ref()
                .and_then(|p| p.get("name"))
                .and_then(Value::as_str)
            {
                return name;
            }
        }
        &self.method
    }

    /// Builds the retry request: this request with `payload` attached to its payment
    /// side channel. Other `_meta` entries are left untouched.
    ///
    /// Consumes `self`; callers retrying keep their own copy of the base request.
    pub fn with_payment(mut self, payload: &PaymentPayload) -> Result<Self> {
        let params = self.params.get_or_insert_with(|| Value::Object(Map::new()));
        let params = params.as_object_mut().ok_or_else(|| {
            X402Error::InvalidPayload("cannot attach payment to positional params".to_string())
        })?;

        let meta = params
            .entry(META_KEY)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| X402Error::InvalidPayload("params._meta is not an object".to_string()))?;

        meta.insert(PAYMENT_META_KEY.to_string(), serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Extracts the payment payload from the side channel.
    ///
    /// `Ok(None)` when no payment is attached, `Err` when something is attached but
    /// does not parse as a [`PaymentPayload`].
    pub fn payment(&self) -> Result<Option<PaymentPayload>> {
        let raw = match self
            .params
            .as_ref()
            .and_then(|p| p.get(META_KEY))
            .and_then(|m| m.get(PAYMENT_META_KEY))
        {
            Some(raw) if !raw.is_null() => raw,
            _ => return Ok(None),
        };

        serde_json::from_value(raw.clone())
            .map(Some)
            .map_err(|e| {
                X402Error::InvalidPayload(format!("malformed {}: {}", PAYMENT_META_KEY, e))
            })
    }
}

/// A JSON-RPC error object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcError {
    /// Error code
    pub code: i64,

    /// Human-readable message
    pub message: String,

    /// Structured error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Creates an error without data.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Invalid-params error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(RPC_INVALID_PARAMS, message)
    }

    /// Internal error (-32603).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RPC_INTERNAL_ERROR, message)
    }

    /// Payment-required signal carrying `response` as its data.
    pub fn payment_required(response: &PaymentRequiredResponse) -> Result<Self> {
        let message = response
            .error
            .clone()
            .unwrap_or_else(|| "Payment required".to_string());
        Ok(Self {
            code: RPC_PAYMENT_REQUIRED,
            message,
            data: Some(serde_json::to_value(response)?),
        })
    }

    /// Returns true if this is a payment-required signal.
    pub fn is_payment_required(&self) -> bool {
        self.code == RPC_PAYMENT_REQUIRED
    }
}

impl From<&X402Error> for JsonRpcError {
    fn from(err: &X402Error) -> Self {
        Self::new(err.rpc_code(), err.to_string())
    }
}

/// A JSON-RPC response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    /// Always "2.0"
    pub jsonrpc: String,

    /// Id of the request being answered
    #[serde(default)]
    pub id: Value,

    /// Result on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Successful response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response.
    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Returns true when the response is an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Parses the payment-required signal, if this response is one.
    pub fn payment_required(&self) -> Result<Option<PaymentRequiredResponse>> {
        let error = match &self.error {
            Some(error) if error.is_payment_required() => error,
            _ => return Ok(None),
        };

        let data = error.data.clone().ok_or_else(|| {
            X402Error::InvalidPayload("payment-required signal without requirements".to_string())
        })?;

        let mut required: PaymentRequiredResponse =
            serde_json::from_value(data).map_err(|e| {
                X402Error::InvalidPayload(format!("malformed payment requirements: {}", e))
            })?;
        if required.error.is_none() {
            required.error = Some(error.message.clone());
        }
        Ok(Some(required))
    }

    /// Extracts the settlement confirmation from the result side channel.
    pub fn settlement(&self) -> Result<Option<SettlementResponse>> {
        let raw = match self
            .result
            .as_ref()
            .and_then(|r| r.get(META_KEY))
            .and_then(|m| m.get(PAYMENT_RESPONSE_META_KEY))
        {
            Some(raw) if !raw.is_null() => raw,
            _ => return Ok(None),
        };

        serde_json::from_value(raw.clone()).map(Some).map_err(|e| {
            X402Error::InvalidPayload(format!("malformed {}: {}", PAYMENT_RESPONSE_META_KEY, e))
        })
    }

    /// Stamps `settlement` into the result side channel.
    ///
    /// Fails when the response has no object result to carry metadata.
    pub fn with_settlement(mut self, settlement: &SettlementResponse) -> Result<Self> {
        let result = self
            .result
            .as_mut()
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                X402Error::InvalidPayload(
                    "result is not an object; cannot stamp settlement".to_string(),
                )
            })?;

        let meta = result
            .entry(META_KEY)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| X402Error::InvalidPayload("result._meta is not an object".to_string()))?;

        meta.insert(
            PAYMENT_RESPONSE_META_KEY.to_string(),
            serde_json::to_value(settlement)?,
        );
        Ok(self)
    }
}
