//! Signer for the "exact" payment scheme on EVM-compatible chains.
//!
//! The payer signs an EIP-3009 `transferWithAuthorization` message over EIP-712 typed
//! data. The facilitator later submits the authorization on-chain and pays the gas, so
//! signing needs neither ETH nor an RPC connection: the chain id is derived from the
//! network name.

use crate::errors::{Result, X402Error};
use crate::signers::PaymentSigner;
use crate::types::{
    ClientPaymentOption, PaymentPayload, PaymentRequirements, TransferAuthorization,
    SCHEME_EXACT, X402_VERSION,
};
use crate::utils::{current_timestamp, generate_nonce, parse_address, parse_amount};
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::core::utils::keccak256;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U256};
use serde_json::json;
use tracing::debug;

// EIP-712 domain defaults for USDC
const EIP712_DOMAIN_NAME: &str = "USD Coin";
const EIP712_DOMAIN_VERSION: &str = "2";

const TRANSFER_WITH_AUTHORIZATION_TYPE: &str = concat!(
    "TransferWithAuthorization(address from,address to,uint256 value,",
    "uint256 validAfter,uint256 validBefore,bytes32 nonce)"
);

/// Validity window used when a requirement does not set `maxTimeoutSeconds`.
const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// Maps an x402 network name to its EVM chain id.
///
/// Accepts the well-known names, CAIP-2 `eip155:<id>` identifiers and bare numeric ids.
///
/// # Examples
///
/// ```
/// use x402_rpc::signers::exact_evm::chain_id_for_network;
///
/// assert_eq!(chain_id_for_network("base").unwrap(), 8453);
/// assert_eq!(chain_id_for_network("eip155:84532").unwrap(), 84532);
/// assert!(chain_id_for_network("solana").is_err());
/// ```
pub fn chain_id_for_network(network: &str) -> Result<u64> {
    let id = match network {
        "base" => 8453,
        "base-sepolia" => 84532,
        "ethereum" | "mainnet" => 1,
        "sepolia" => 11155111,
        "polygon" => 137,
        "polygon-amoy" => 80002,
        "avalanche" => 43114,
        "avalanche-fuji" => 43113,
        other => {
            let raw = other.strip_prefix("eip155:").unwrap_or(other);
            raw.parse::<u64>()
                .map_err(|_| X402Error::UnsupportedNetwork(network.to_string()))?
        }
    };
    Ok(id)
}

/// EVM signer backed by a local private key.
///
/// # Examples
///
/// ```
/// use x402_rpc::signers::{EvmSigner, PaymentSigner};
/// use x402_rpc::types::ClientPaymentOption;
///
/// let signer = EvmSigner::new(
///     "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
/// )
/// .unwrap()
/// .with_option(ClientPaymentOption::usdc_base().with_max_amount("100000"));
///
/// assert!(signer.supports_network("base"));
/// ```
#[derive(Clone)]
pub struct EvmSigner {
    wallet: LocalWallet,
    options: Vec<ClientPaymentOption>,
    priority: i32,
}

impl EvmSigner {
    /// Creates a signer from a hex private key (with or without 0x prefix).
    pub fn new(private_key: &str) -> Result<Self> {
        let wallet = private_key
            .trim()
            .parse::<LocalWallet>()
            .map_err(|e| X402Error::ConfigError(format!("Invalid private key: {}", e)))?;

        Ok(Self {
            wallet,
            options: Vec::new(),
            priority: 0,
        })
    }

    /// Declares a payment option.
    pub fn with_option(mut self, option: ClientPaymentOption) -> Self {
        self.options.push(option);
        self
    }

    /// Sets the signer priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Returns the declared options.
    pub fn options(&self) -> &[ClientPaymentOption] {
        &self.options
    }

    /// Creates the EIP-712 typed data hash for the transfer authorization.
    fn create_authorization_hash(
        from: Address,
        to: Address,
        value: U256,
        valid_after: U256,
        valid_before: U256,
        nonce: H256,
        domain_separator: H256,
    ) -> H256 {
        let type_hash = keccak256(TRANSFER_WITH_AUTHORIZATION_TYPE.as_bytes());

        let struct_hash = keccak256(ethers::abi::encode(&[
            Token::FixedBytes(type_hash.to_vec()),
            Token::Address(from),
            Token::Address(to),
            Token::Uint(value),
            Token::Uint(valid_after),
            Token::Uint(valid_before),
            Token::FixedBytes(nonce.as_bytes().to_vec()),
        ]));

        // "\x19\x01" ‖ domainSeparator ‖ hashStruct(message)
        let mut message = Vec::with_capacity(66);
        message.extend_from_slice(b"\x19\x01");
        message.extend_from_slice(domain_separator.as_bytes());
        message.extend_from_slice(&struct_hash);

        H256::from(keccak256(&message))
    }

    /// Creates the domain separator for EIP-712.
    fn create_domain_separator(
        token_address: Address,
        chain_id: U256,
        name: &str,
        version: &str,
    ) -> H256 {
        let type_hash = keccak256(
            b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
        );

        H256::from(keccak256(ethers::abi::encode(&[
            Token::FixedBytes(type_hash.to_vec()),
            Token::FixedBytes(keccak256(name.as_bytes()).to_vec()),
            Token::FixedBytes(keccak256(version.as_bytes()).to_vec()),
            Token::Uint(chain_id),
            Token::Address(token_address),
        ])))
    }

    fn token_domain(requirement: &PaymentRequirements) -> (String, String) {
        let extra = requirement.extra.as_ref();
        let name = extra
            .and_then(|e| e.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or(EIP712_DOMAIN_NAME);
        let version = extra
            .and_then(|e| e.get("version"))
            .and_then(|v| v.as_str())
            .unwrap_or(EIP712_DOMAIN_VERSION);
        (name.to_string(), version.to_string())
    }
}

#[async_trait]
impl PaymentSigner for EvmSigner {
    async fn sign_payment(&self, requirement: &PaymentRequirements) -> Result<PaymentPayload> {
        if requirement.scheme != SCHEME_EXACT {
            return Err(X402Error::UnsupportedScheme(requirement.scheme.clone()));
        }

        let option = self
            .payment_option(&requirement.network, &requirement.asset)
            .ok_or_else(|| {
                X402Error::SigningFailed(format!(
                    "no option declared for {} on {}",
                    requirement.asset, requirement.network
                ))
            })?;

        let amount = requirement.amount()?;
        if let Some(ceiling) = &option.max_amount {
            let ceiling = parse_amount(ceiling)?;
            if amount > ceiling {
                return Err(X402Error::InvalidAmount(format!(
                    "{} exceeds the signer ceiling of {}",
                    amount, ceiling
                )));
            }
        }

        let chain_id = chain_id_for_network(&requirement.network)?;
        let to = parse_address(&requirement.pay_to)?;
        let asset = parse_address(&requirement.asset)?;
        let from = self.wallet.address();
        let value = U256::from(amount);

        let nonce_bytes = generate_nonce();
        let nonce = H256::from(nonce_bytes);

        let timeout = match requirement.max_timeout_seconds {
            0 => DEFAULT_TIMEOUT_SECONDS,
            t => t,
        };
        let now = current_timestamp();
        let deadline = now.checked_add(timeout).ok_or_else(|| {
            X402Error::SigningFailed(format!("validity window of {}s overflows", timeout))
        })?;
        let valid_after = U256::from(now);
        let valid_before = U256::from(deadline);

        let (token_name, token_version) = Self::token_domain(requirement);
        let domain_separator = Self::create_domain_separator(
            asset,
            U256::from(chain_id),
            &token_name,
            &token_version,
        );
        let message_hash = Self::create_authorization_hash(
            from,
            to,
            value,
            valid_after,
            valid_before,
            nonce,
            domain_separator,
        );

        let signature = self.wallet.sign_hash(message_hash)?;

        let mut r_bytes = [0u8; 32];
        signature.r.to_big_endian(&mut r_bytes);
        let mut s_bytes = [0u8; 32];
        signature.s.to_big_endian(&mut s_bytes);

        let mut sig_bytes = Vec::with_capacity(65);
        sig_bytes.extend_from_slice(&r_bytes);
        sig_bytes.extend_from_slice(&s_bytes);
        sig_bytes.push(signature.v as u8);

        let authorization = TransferAuthorization {
            from: format!("{:?}", from),
            to: format!("{:?}", to),
            value: value.to_string(),
            valid_after: valid_after.to_string(),
            valid_before: valid_before.to_string(),
            nonce: format!("0x{}", hex::encode(nonce_bytes)),
            signature: format!("0x{}", hex::encode(sig_bytes)),
        };

        debug!(
            from = %authorization.from,
            to = %authorization.to,
            value = %authorization.value,
            network = %requirement.network,
            "signed EIP-3009 authorization"
        );

        Ok(PaymentPayload {
            x402_version: X402_VERSION,
            scheme: SCHEME_EXACT.to_string(),
            network: requirement.network.clone(),
            payload: json!({
                "signature": authorization.signature,
                "authorization": authorization,
            }),
        })
    }

    fn address(&self) -> String {
        format!("{:?}", self.wallet.address())
    }

    fn supports_network(&self, network: &str) -> bool {
        self.options.iter().any(|o| o.network == network)
    }

    fn has_asset(&self, asset: &str, network: &str) -> bool {
        self.options.iter().any(|o| o.covers(network, asset))
    }

    fn payment_option(&self, network: &str, asset: &str) -> Option<ClientPaymentOption> {
        self.options.iter().find(|o| o.covers(network, asset)).cloned()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

impl std::fmt::Debug for EvmSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmSigner")
            .field("address", &self.address())
            .field("options", &self.options)
            .field("priority", &self.priority)
            .finish()
    }
}
