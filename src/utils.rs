//! Utility functions for x402 operations.
//!
//! This module provides helper functions for amount parsing, encoding/decoding,
//! conversions, and other common operations used throughout the library.

use crate::errors::{Result, X402Error};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ethers::types::Address;
use serde::{de::DeserializeOwned, Serialize};
use std::str::FromStr;

/// Parses a decimal-string amount in the asset's smallest unit.
///
/// Only plain ASCII digits are accepted and the amount must be positive. Amounts are held
/// as `u128`; a wire value above `u128::MAX` is refused with an explicit range error
/// rather than truncated.
///
/// # Examples
///
/// ```
/// use x402_rpc::utils::parse_amount;
///
/// assert_eq!(parse_amount("1000").unwrap(), 1000);
/// assert!(parse_amount("0").is_err());
/// assert!(parse_amount("-5").is_err());
/// assert!(parse_amount("1e3").is_err());
/// ```
pub fn parse_amount(s: &str) -> Result<u128> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(X402Error::InvalidAmount(format!(
            "'{}' is not a decimal integer",
            s
        )));
    }

    let value: u128 = s.parse().map_err(|_| {
        X402Error::InvalidAmount(format!(
            "'{}' is above the supported maximum of {}",
            s,
            u128::MAX
        ))
    })?;

    if value == 0 {
        return Err(X402Error::InvalidAmount("amount must be positive".to_string()));
    }

    Ok(value)
}

/// Serializes `value` as Base64 JSON, the encoding x402 uses in HTTP headers.
///
/// # Examples
///
/// ```
/// use x402_rpc::types::PaymentPayload;
/// use x402_rpc::utils::{encode_header, decode_header};
/// use serde_json::json;
///
/// let payload = PaymentPayload {
///     x402_version: 1,
///     scheme: "exact".to_string(),
///     network: "base".to_string(),
///     payload: json!({}),
/// };
///
/// let encoded = encode_header(&payload).unwrap();
/// let decoded: PaymentPayload = decode_header(&encoded).unwrap();
/// assert_eq!(decoded.scheme, "exact");
/// ```
pub fn encode_header<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(BASE64.encode(json.as_bytes()))
}

/// Decodes a Base64 JSON header value.
pub fn decode_header<T: DeserializeOwned>(encoded: &str) -> Result<T> {
    let decoded = BASE64.decode(encoded.trim().as_bytes())?;
    let json_str = String::from_utf8(decoded)
        .map_err(|e| X402Error::InvalidPayload(format!("Invalid UTF-8: {}", e)))?;
    Ok(serde_json::from_str(&json_str)?)
}

/// Validates and parses an Ethereum address.
///
/// # Examples
///
/// ```
/// use x402_rpc::utils::parse_address;
///
/// assert!(parse_address("0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb").is_ok());
/// assert!(parse_address("not-an-address").is_err());
/// ```
pub fn parse_address(addr: &str) -> Result<Address> {
    Address::from_str(addr).map_err(|e| X402Error::InvalidAddress(format!("{}: {}", addr, e)))
}

/// Generates a random 32-byte nonce for EIP-3009 authorization.
///
/// # Examples
///
/// ```
/// use x402_rpc::utils::generate_nonce;
///
/// let nonce = generate_nonce();
/// assert_eq!(nonce.len(), 32);
/// ```
pub fn generate_nonce() -> [u8; 32] {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    rng.gen()
}

/// Converts a dollar amount to the smallest token unit based on decimals.
///
/// # Arguments
///
/// * `dollar_amount` - Amount in dollars (e.g., 0.01 for 1 cent)
/// * `decimals` - Token decimals (e.g., 6 for USDC)
/// * `token_usd_price` - Current price of 1 token in USD (e.g., 1.0 for stablecoins)
///
/// # Examples
///
/// ```
/// use x402_rpc::utils::dollar_to_token_amount;
///
/// // $0.01 in USDC (6 decimals, $1 per USDC)
/// let amount = dollar_to_token_amount(0.01, 6, 1.0).unwrap();
/// assert_eq!(amount, "10000");
/// ```
pub fn dollar_to_token_amount(
    dollar_amount: f64,
    decimals: u8,
    token_usd_price: f64,
) -> Result<String> {
    if token_usd_price <= 0.0 {
        return Err(X402Error::InvalidAmount("Token price must be positive".to_string()));
    }
    if !dollar_amount.is_finite() || dollar_amount <= 0.0 {
        return Err(X402Error::InvalidAmount(format!(
            "Price must be a positive number, got {}",
            dollar_amount
        )));
    }

    let token_amount = dollar_amount / token_usd_price;
    let multiplier = 10f64.powi(decimals as i32);
    let smallest_unit = (token_amount * multiplier).round() as u128;

    Ok(smallest_unit.to_string())
}

/// Gets the current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
