//! Deterministic in-memory [`ChainClient`].
//!
//! Stands in for a node in tests. Compiled only for tests or with the
//! `test-utils` feature. Every answer is configured up front; the only
//! mutable state is a few counters so tests can assert on call patterns.

use alloy::consensus::TxEnvelope;
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{keccak256, Address, TxHash};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{ClientError, ClientResult, FeeData, ReceiptData, TokenInfo};

/// How the mock answers `eth_sendRawTransaction`.
#[derive(Debug, Clone)]
pub enum SendBehavior {
    /// Accept and return the keccak hash of the payload.
    Accept,
    /// Answer with a JSON-RPC error.
    Reject(String),
    /// Fail below the JSON-RPC layer.
    Transport(String),
}

/// Scripted chain node.
#[derive(Debug)]
pub struct MockChainClient {
    endpoint: String,
    chain_id: u64,
    fee_data: FeeData,
    nonce: u64,
    gas_estimate: Option<u64>,
    token: Option<TokenInfo>,
    send: SendBehavior,
    receipt_status: u64,
    /// Receipt polls answered with `None` before the receipt shows up.
    pending_polls: usize,
    /// Receipt polls that fail outright before answering normally.
    flaky_polls: usize,
    /// `None` means the transaction never gets mined.
    mined_at: Option<u64>,
    block_number: AtomicU64,
    latency: Option<Duration>,
    failing: Option<ClientError>,
    receipt_polls: AtomicUsize,
    sent: AtomicUsize,
    nonce_queries: AtomicUsize,
}

impl MockChainClient {
    /// A healthy legacy-fee node with sensible defaults.
    pub fn new(endpoint: &str, chain_id: u64) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            chain_id,
            fee_data: FeeData {
                gas_price: Some(20_000_000_000),
                max_fee_per_gas: None,
                max_priority_fee_per_gas: None,
            },
            nonce: 0,
            gas_estimate: Some(52_000),
            token: None,
            send: SendBehavior::Accept,
            receipt_status: 1,
            pending_polls: 0,
            flaky_polls: 0,
            mined_at: Some(1_234_567),
            block_number: AtomicU64::new(1_234_567),
            latency: None,
            failing: None,
            receipt_polls: AtomicUsize::new(0),
            sent: AtomicUsize::new(0),
            nonce_queries: AtomicUsize::new(0),
        }
    }

    pub fn with_fee_data(mut self, fee_data: FeeData) -> Self {
        self.fee_data = fee_data;
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// `None` makes gas estimation fail.
    pub fn with_gas_estimate(mut self, gas: Option<u64>) -> Self {
        self.gas_estimate = gas;
        self
    }

    /// `None` makes token metadata reads fail.
    pub fn with_token(mut self, token: Option<TokenInfo>) -> Self {
        self.token = token;
        self
    }

    pub fn with_send(mut self, send: SendBehavior) -> Self {
        self.send = send;
        self
    }

    pub fn with_receipt_status(mut self, status_code: u64) -> Self {
        self.receipt_status = status_code;
        self
    }

    /// Answer `None` to the first `polls` receipt queries.
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Fail the first `polls` receipt queries with a transport error.
    pub fn with_flaky_receipts(mut self, polls: usize) -> Self {
        self.flaky_polls = polls;
        self
    }

    /// Block the transaction lands in; `None` keeps it pending forever.
    pub fn with_mined_at(mut self, block: Option<u64>) -> Self {
        self.mined_at = block;
        self
    }

    pub fn with_block_number(self, block: u64) -> Self {
        self.block_number.store(block, Ordering::SeqCst);
        self
    }

    /// Delay every call, to exercise timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every read call with `err`.
    pub fn failing(mut self, err: ClientError) -> Self {
        self.failing = Some(err);
        self
    }

    /// Advance the chain head.
    pub fn advance_blocks(&self, blocks: u64) {
        self.block_number.fetch_add(blocks, Ordering::SeqCst);
    }

    pub fn receipt_polls(&self) -> usize {
        self.receipt_polls.load(Ordering::SeqCst)
    }

    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn nonce_queries(&self) -> usize {
        self.nonce_queries.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> ClientResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.failing {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_chain_id(&self) -> ClientResult<u64> {
        self.enter().await?;
        Ok(self.chain_id)
    }

    async fn get_fee_data(&self) -> ClientResult<FeeData> {
        self.enter().await?;
        Ok(self.fee_data)
    }

    async fn get_transaction_count(&self, _address: Address) -> ClientResult<u64> {
        self.enter().await?;
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.nonce)
    }

    async fn estimate_gas(&self, _tx: TransactionRequest) -> ClientResult<u64> {
        self.enter().await?;
        self.gas_estimate.ok_or_else(|| ClientError::Rejected {
            code: 3,
            message: "execution reverted".to_string(),
        })
    }

    async fn token_metadata(&self, _token: Address) -> ClientResult<TokenInfo> {
        self.enter().await?;
        self.token.clone().ok_or_else(|| ClientError::Rejected {
            code: -32000,
            message: "execution reverted".to_string(),
        })
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> ClientResult<TxHash> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.send {
            SendBehavior::Accept => {
                // Nodes decode before accepting; so does the mock.
                if TxEnvelope::decode_2718(&mut &raw[..]).is_err() {
                    return Err(ClientError::Rejected {
                        code: -32000,
                        message: "rlp: expected input list for types.LegacyTx".to_string(),
                    });
                }
                self.sent.fetch_add(1, Ordering::SeqCst);
                Ok(keccak256(raw))
            }
            SendBehavior::Reject(reason) => Err(ClientError::Rejected {
                code: -32000,
                message: reason.clone(),
            }),
            SendBehavior::Transport(reason) => Err(ClientError::Transport(reason.clone())),
        }
    }

    async fn get_transaction_receipt(&self, hash: TxHash) -> ClientResult<Option<ReceiptData>> {
        self.enter().await?;
        let poll = self.receipt_polls.fetch_add(1, Ordering::SeqCst);
        if poll < self.flaky_polls {
            return Err(ClientError::Transport("connection reset by peer".to_string()));
        }
        let Some(block) = self.mined_at else {
            return Ok(None);
        };
        if poll < self.pending_polls {
            return Ok(None);
        }

        Ok(Some(ReceiptData {
            transaction_hash: hash,
            block_hash: Some(keccak256(block.to_be_bytes())),
            block_number: Some(block),
            from: Address::repeat_byte(0x11),
            to: Some(Address::repeat_byte(0x22)),
            status_code: self.receipt_status,
        }))
    }

    async fn get_block_number(&self) -> ClientResult<u64> {
        self.enter().await?;
        Ok(self.block_number.load(Ordering::SeqCst))
    }
}
