//! Payment request, transaction and receipt types.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, B256, U256, U64};
use alloy::rpc::types::TransactionRequest;
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::blockchain::fees::FeeQuote;
use crate::blockchain::registry::ChainConfig;
use crate::blockchain::types::{GatewayError, GatewayResult, ReceiptData, ReceiptStatus};

/// Amount as sent by callers: a decimal string or a JSON number.
///
/// Number literals are kept as written. Going through `f64` would round
/// high-precision decimals and turn large integers into exponent form.
#[derive(Debug, Clone, PartialEq)]
pub enum Amount {
    Text(String),
    Number(String),
}

impl Amount {
    /// Decimal text of the amount, exactly as written by the caller.
    pub fn as_decimal_string(&self) -> String {
        match self {
            Amount::Text(s) => s.trim().to_string(),
            Amount::Number(n) => n.clone(),
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Amount::Text(s) => serializer.serialize_str(s),
            Amount::Number(n) => RawValue::from_string(n.clone())
                .map_err(ser::Error::custom)?
                .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let literal = raw.get().trim();
        match literal.as_bytes().first() {
            Some(b'"') => serde_json::from_str(literal)
                .map(Amount::Text)
                .map_err(de::Error::custom),
            Some(b'-' | b'0'..=b'9') => Ok(Amount::Number(literal.to_string())),
            _ => Err(de::Error::custom("amount must be a string or a number")),
        }
    }
}

impl From<&str> for Amount {
    fn from(s: &str) -> Self {
        Amount::Text(s.to_string())
    }
}

/// Request to build an unsigned payment transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Chain key, case-insensitive.
    pub chain: String,
    /// Recipient address.
    pub to: String,
    /// Amount in whole units (e.g. "0.1" ETH or "25" USDC).
    pub amount: Amount,
    /// ERC-20 contract; absent for native transfers.
    #[serde(default)]
    pub token_address: Option<String>,
    /// Token decimals, when the caller knows them.
    #[serde(default)]
    pub token_decimals: Option<u8>,
    /// Sender; defaults to the configured sender address.
    #[serde(default)]
    pub from: Option<String>,
}

impl PaymentRequest {
    /// A native transfer request.
    pub fn native(chain: &str, to: &str, amount: impl Into<Amount>) -> Self {
        Self {
            chain: chain.to_string(),
            to: to.to_string(),
            amount: amount.into(),
            token_address: None,
            token_decimals: None,
            from: None,
        }
    }

    /// A token transfer request.
    pub fn token(chain: &str, to: &str, amount: impl Into<Amount>, token: &str) -> Self {
        Self {
            token_address: Some(token.to_string()),
            ..Self::native(chain, to, amount)
        }
    }
}

/// Parse a 0x-prefixed 20-byte hex address, any case.
pub fn parse_address(value: &str) -> GatewayResult<Address> {
    let trimmed = value.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| GatewayError::InvalidAddress(value.to_string()))?;

    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(GatewayError::InvalidAddress(value.to_string()));
    }

    // Mixed-case input is accepted without checksum enforcement; the
    // output is always normalized to lower case.
    let bytes = alloy::hex::decode(hex).map_err(|_| GatewayError::InvalidAddress(value.to_string()))?;
    Ok(Address::from_slice(&bytes))
}

/// Canonical lower-case `0x` form of an address.
pub fn lower_hex(address: &Address) -> String {
    format!("0x{}", alloy::hex::encode(address))
}

fn serialize_lower<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&lower_hex(address))
}

fn serialize_lower_opt<S: Serializer>(address: &Option<Address>, serializer: S) -> Result<S::Ok, S::Error> {
    match address {
        Some(address) => serializer.serialize_str(&lower_hex(address)),
        None => serializer.serialize_none(),
    }
}

/// Transaction ready for external signing. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    /// Recipient for native transfers, token contract for token transfers.
    #[serde(serialize_with = "serialize_lower")]
    pub to: Address,
    /// Native value in base units; zero for token transfers.
    pub value: U256,
    /// `0x` for native transfers, `transfer(address,uint256)` call otherwise.
    pub data: Bytes,
    pub gas_limit: U64,
    #[serde(flatten)]
    pub fees: FeeQuote,
    pub nonce: U64,
}

impl UnsignedTransaction {
    /// Convert into an alloy request for signers that consume one.
    pub fn to_transaction_request(&self) -> TransactionRequest {
        let tx = TransactionRequest::default()
            .with_chain_id(self.chain_id)
            .with_to(self.to)
            .with_value(self.value)
            .with_input(self.data.clone())
            .with_gas_limit(self.gas_limit.to::<u64>())
            .with_nonce(self.nonce.to::<u64>());

        match self.fees {
            FeeQuote::Legacy { gas_price } => tx.with_gas_price(gas_price.saturating_to::<u128>()),
            FeeQuote::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => tx
                .with_max_fee_per_gas(max_fee_per_gas.saturating_to::<u128>())
                .with_max_priority_fee_per_gas(max_priority_fee_per_gas.saturating_to::<u128>()),
        }
    }

    /// True when this transaction calls a token contract.
    pub fn is_token_transfer(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Where the gas limit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GasLimitSource {
    /// Fixed default (21000 for native, configured fallback for tokens).
    Default,
    /// `eth_estimateGas`.
    Estimated,
}

/// Where token decimals came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecimalsSource {
    Request,
    Contract,
    /// The contract could not be read; 18 was assumed.
    Assumed,
}

/// Token display information attached to token-transfer builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDisplay {
    #[serde(serialize_with = "serialize_lower")]
    pub address: Address,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: u8,
    pub decimals_source: DecimalsSource,
    pub decimals_assumed: bool,
}

/// Descriptive data returned alongside a built transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMetadata {
    /// Upper bound of the network fee, in whole native units.
    pub estimated_fee: String,
    /// Same bound in native base units.
    pub estimated_fee_base_units: U256,
    /// Native symbol for native transfers, `TOKEN` for token transfers.
    pub fee_currency: String,
    pub fee_model: &'static str,
    pub gas_limit_source: GasLimitSource,
    #[serde(serialize_with = "serialize_lower")]
    pub sender: Address,
    #[serde(serialize_with = "serialize_lower")]
    pub recipient: Address,
    /// Transferred amount in the smallest unit of the asset.
    pub amount_base_units: U256,
    pub chain: String,
    pub chain_name: String,
    pub is_testnet: bool,
    pub token_info: Option<TokenDisplay>,
}

/// Output of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltPayment {
    pub transaction: UnsignedTransaction,
    pub metadata: PaymentMetadata,
}

/// Normalized receipt of a confirmed broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReceipt {
    pub tx_hash: TxHash,
    pub block_hash: Option<B256>,
    pub block_number: Option<u64>,
    #[serde(serialize_with = "serialize_lower")]
    pub from: Address,
    #[serde(serialize_with = "serialize_lower_opt")]
    pub to: Option<Address>,
    pub status: ReceiptStatus,
    pub explorer_url: Option<String>,
}

impl BroadcastReceipt {
    /// Normalize a node receipt for `chain`.
    pub fn from_receipt(receipt: ReceiptData, chain: &ChainConfig) -> Self {
        let explorer_url = chain.explorer.as_ref().map(|base| {
            format!("{}/tx/{}", base.trim_end_matches('/'), receipt.transaction_hash)
        });

        Self {
            tx_hash: receipt.transaction_hash,
            block_hash: receipt.block_hash,
            block_number: receipt.block_number,
            from: receipt.from,
            to: receipt.to,
            status: ReceiptStatus::from_code(receipt.status_code),
            explorer_url,
        }
    }
}
