//! Signed transaction broadcast and confirmation.
//!
//! # Responsibilities
//! - Check a signed payload decodes and targets the right chain
//! - Submit it once (never resubmit)
//! - Poll for the receipt under a confirmation deadline
//! - Normalize the receipt status
//!
//! # Failure Semantics
//! ```text
//! undecodable payload / node refusal → Rejected            (nothing mined)
//! wrong chain id                     → ChainMismatch       (nothing sent)
//! submission transport failure       → Broadcast           (fate unknown)
//! failed reads while confirming      → polled again until the deadline
//! no receipt before deadline         → ConfirmationTimeout (may still be mined)
//! ```

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::TxHash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::blockchain::client::ChainClient;
use crate::blockchain::pool::ConnectionPool;
use crate::blockchain::registry::{ChainConfig, ChainRegistry};
use crate::blockchain::types::{
    ClientError, ClientResult, GatewayError, GatewayResult, ReceiptData, BLOCK_NUMBER_OPERATION,
    RECEIPT_OPERATION, SUBMIT_OPERATION,
};
use crate::payments::types::BroadcastReceipt;
use crate::resilience::with_timeout;

/// Reason reported when a node refuses a payload without saying why.
const UNSPECIFIED_REJECTION: &str = "transaction rejected by node";

/// Broadcaster knobs taken from configuration.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Bound for each single RPC call.
    pub rpc_timeout: Duration,
    /// Bound for the whole wait-for-mining phase.
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    /// Blocks required including the inclusion block (1 = mined).
    pub confirmation_blocks: u64,
}

/// Submits signed transactions and waits for their receipts.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<ChainRegistry>,
    pool: Arc<ConnectionPool>,
    settings: BroadcastSettings,
}

impl Broadcaster {
    pub fn new(registry: Arc<ChainRegistry>, pool: Arc<ConnectionPool>, settings: BroadcastSettings) -> Self {
        Self {
            registry,
            pool,
            settings,
        }
    }

    /// Submit `signed_tx_hex` on `chain_key` and wait for it to be mined.
    pub async fn broadcast(&self, chain_key: &str, signed_tx_hex: &str) -> GatewayResult<BroadcastReceipt> {
        let chain = self.registry.resolve(chain_key)?;
        let raw = decode_signed(signed_tx_hex, chain)?;

        let client = self.pool.acquire(chain).map_err(GatewayError::Broadcast)?;
        let tx_hash = self.submit(client.as_ref(), &raw).await?;
        tracing::info!(chain = %chain.id, tx_hash = %tx_hash, "Transaction submitted");

        let receipt = self.wait_for_confirmation(client.as_ref(), tx_hash).await?;
        let receipt = BroadcastReceipt::from_receipt(receipt, chain);

        tracing::info!(
            chain = %chain.id,
            tx_hash = %receipt.tx_hash,
            block = ?receipt.block_number,
            status = ?receipt.status,
            "Transaction confirmed"
        );
        Ok(receipt)
    }

    async fn submit(&self, client: &dyn ChainClient, raw: &[u8]) -> GatewayResult<TxHash> {
        with_timeout(SUBMIT_OPERATION, self.settings.rpc_timeout, client.send_raw_transaction(raw))
            .await?
            .map_err(|err| match err {
                ClientError::Rejected { message, .. } => {
                    tracing::warn!(reason = %message, "Node rejected transaction");
                    if message.trim().is_empty() {
                        GatewayError::Rejected(UNSPECIFIED_REJECTION.to_string())
                    } else {
                        GatewayError::Rejected(message)
                    }
                }
                other => GatewayError::Broadcast(other),
            })
    }

    /// Poll until the receipt is deep enough or the confirmation deadline passes.
    pub async fn wait_for_confirmation(
        &self,
        client: &dyn ChainClient,
        tx_hash: TxHash,
    ) -> GatewayResult<ReceiptData> {
        let limit = self.settings.confirmation_timeout;
        match tokio::time::timeout(limit, self.poll_receipt(client, tx_hash)).await {
            Ok(receipt) => Ok(receipt),
            Err(_) => {
                tracing::warn!(tx_hash = %tx_hash, limit_secs = limit.as_secs(), "Confirmation timed out");
                Err(GatewayError::ConfirmationTimeout {
                    tx_hash,
                    secs: limit.as_secs(),
                })
            }
        }
    }

    /// Poll for the receipt. Failed reads are logged and retried; only the
    /// confirmation deadline ends the wait.
    async fn poll_receipt(&self, client: &dyn ChainClient, tx_hash: TxHash) -> ReceiptData {
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let poll = self.read(RECEIPT_OPERATION, client.get_transaction_receipt(tx_hash));
            let receipt = match poll.await {
                Ok(Some(receipt)) => receipt,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(tx_hash = %tx_hash, error = %err, "Receipt poll failed, will retry");
                    continue;
                }
            };

            // A reverted transaction will not change with more blocks.
            if receipt.status_code != 1 || self.settings.confirmation_blocks <= 1 {
                return receipt;
            }
            let Some(mined_at) = receipt.block_number else {
                return receipt;
            };

            let head = match self.read(BLOCK_NUMBER_OPERATION, client.get_block_number()).await {
                Ok(head) => head,
                Err(err) => {
                    tracing::warn!(tx_hash = %tx_hash, error = %err, "Chain head read failed, will retry");
                    continue;
                }
            };
            let confirmations = head.saturating_sub(mined_at) + 1;
            if confirmations >= self.settings.confirmation_blocks {
                return receipt;
            }
            tracing::debug!(tx_hash = %tx_hash, confirmations, "Waiting for more confirmations");
        }
    }

    /// One bounded read while confirming.
    async fn read<T, F>(&self, operation: &'static str, call: F) -> GatewayResult<T>
    where
        F: std::future::Future<Output = ClientResult<T>>,
    {
        with_timeout(operation, self.settings.rpc_timeout, call)
            .await?
            .map_err(GatewayError::Broadcast)
    }
}

/// Decode a hex payload and check it is a transaction for `chain`.
fn decode_signed(signed_tx_hex: &str, chain: &ChainConfig) -> GatewayResult<Vec<u8>> {
    let hex = signed_tx_hex.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    if hex.is_empty() {
        return Err(GatewayError::Rejected("empty transaction payload".to_string()));
    }

    let raw = alloy::hex::decode(hex)
        .map_err(|e| GatewayError::Rejected(format!("payload is not valid hex: {e}")))?;
    let envelope = TxEnvelope::decode_2718(&mut raw.as_slice())
        .map_err(|e| GatewayError::Rejected(format!("payload is not a signed transaction: {e}")))?;

    // Pre-EIP-155 legacy transactions carry no chain id and are accepted as-is.
    if let Some(actual) = envelope.chain_id() {
        if actual != chain.chain_id {
            return Err(GatewayError::ChainMismatch {
                expected: chain.chain_id,
                actual,
            });
        }
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::fees::FeeQuote;
    use crate::blockchain::mock::{MockChainClient, SendBehavior};
    use crate::blockchain::types::{ClientResult, ErrorKind, ReceiptStatus};
    use crate::payments::types::UnsignedTransaction;
    use alloy::eips::eip2718::Encodable2718;
    use alloy::network::{EthereumWallet, TransactionBuilder};
    use alloy::primitives::{Address, Bytes, U256, U64};
    use alloy::signers::local::PrivateKeySigner;

    /// Well-known development key (first Anvil account).
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    async fn signed_transfer(chain_id: u64) -> String {
        let tx = UnsignedTransaction {
            chain_id,
            to: Address::repeat_byte(0x22),
            value: U256::from(1_000u64),
            data: Bytes::new(),
            gas_limit: U64::from(21_000),
            fees: FeeQuote::Legacy {
                gas_price: U256::from(20_000_000_000u64),
            },
            nonce: U64::from(0),
        };
        let signer: PrivateKeySigner = DEV_KEY.parse().unwrap();
        let from = signer.address();
        let wallet = EthereumWallet::from(signer);

        let envelope = tx
            .to_transaction_request()
            .with_from(from)
            .build(&wallet)
            .await
            .unwrap();
        format!("0x{}", alloy::hex::encode(envelope.encoded_2718()))
    }

    fn broadcaster_with(client: Arc<MockChainClient>, settings: BroadcastSettings) -> Broadcaster {
        let factory = move |_: &str| -> ClientResult<Arc<dyn ChainClient>> {
            Ok(client.clone() as Arc<dyn ChainClient>)
        };
        let registry = ChainRegistry::from_chains([ChainConfig {
            id: "sepolia".into(),
            display_name: "Ethereum Sepolia".into(),
            rpc_endpoint: Some("mock://sepolia".into()),
            chain_id: 11155111,
            native_decimals: 18,
            currency_symbol: "ETH".into(),
            explorer: Some("https://sepolia.etherscan.io".into()),
            is_testnet: true,
        }]);

        Broadcaster::new(
            Arc::new(registry),
            Arc::new(ConnectionPool::new(Arc::new(factory))),
            settings,
        )
    }

    fn settings() -> BroadcastSettings {
        BroadcastSettings {
            rpc_timeout: Duration::from_secs(5),
            confirmation_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
            confirmation_blocks: 1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_pending_polls() {
        let client = Arc::new(MockChainClient::new("mock://sepolia", 11155111).with_pending_polls(3));
        let broadcaster = broadcaster_with(client.clone(), settings());

        let receipt = broadcaster
            .broadcast("Sepolia", &signed_transfer(11155111).await)
            .await
            .unwrap();

        assert_eq!(receipt.status, ReceiptStatus::Success);
        assert_eq!(receipt.block_number, Some(1_234_567));
        assert!(receipt
            .explorer_url
            .as_deref()
            .unwrap()
            .starts_with("https://sepolia.etherscan.io/tx/0x"));
        assert_eq!(client.receipt_polls(), 4);
        assert_eq!(client.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_status() {
        let client = Arc::new(MockChainClient::new("mock://sepolia", 11155111).with_receipt_status(0));
        let broadcaster = broadcaster_with(client, settings());

        let receipt = broadcaster
            .broadcast("sepolia", &signed_transfer(11155111).await)
            .await
            .unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Failed);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected_locally() {
        let client = Arc::new(MockChainClient::new("mock://sepolia", 11155111));
        let broadcaster = broadcaster_with(client.clone(), settings());

        for payload in ["0xdeadbeef", "not-hex", "0x", ""] {
            let err = broadcaster.broadcast("sepolia", payload).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::RejectedTransaction, "{payload}");
            assert!(!err.public_message().is_empty());
        }
        assert_eq!(client.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_chain_is_not_sent() {
        let client = Arc::new(MockChainClient::new("mock://sepolia", 11155111));
        let broadcaster = broadcaster_with(client.clone(), settings());

        let err = broadcaster
            .broadcast("sepolia", &signed_transfer(1).await)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::ChainMismatch {
                expected: 11155111,
                actual: 1
            }
        ));
        assert_eq!(client.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_node_rejection_keeps_reason() {
        let client = Arc::new(
            MockChainClient::new("mock://sepolia", 11155111)
                .with_send(SendBehavior::Reject("insufficient funds for gas * price + value".into())),
        );
        let broadcaster = broadcaster_with(client, settings());

        let err = broadcaster
            .broadcast("sepolia", &signed_transfer(11155111).await)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RejectedTransaction);
        assert!(err.to_string().contains("insufficient funds"));
    }

    #[tokio::test]
    async fn test_empty_rejection_reason_gets_default() {
        let client = Arc::new(
            MockChainClient::new("mock://sepolia", 11155111).with_send(SendBehavior::Reject(String::new())),
        );
        let broadcaster = broadcaster_with(client, settings());

        let err = broadcaster
            .broadcast("sepolia", &signed_transfer(11155111).await)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Rejected(ref reason) if reason == UNSPECIFIED_REJECTION));
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_retry_safe() {
        let client = Arc::new(
            MockChainClient::new("mock://sepolia", 11155111)
                .with_send(SendBehavior::Transport("connection reset".into())),
        );
        let broadcaster = broadcaster_with(client, settings());

        let err = broadcaster
            .broadcast("sepolia", &signed_transfer(11155111).await)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BroadcastError);
        assert!(!err.is_retry_safe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_timeout_carries_hash() {
        let client = Arc::new(MockChainClient::new("mock://sepolia", 11155111).with_mined_at(None));
        let broadcaster = broadcaster_with(client.clone(), settings());

        let err = broadcaster
            .broadcast("sepolia", &signed_transfer(11155111).await)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfirmationTimeout);
        assert!(err.tx_hash().is_some());
        assert!(!err.is_retry_safe());
        assert!(client.receipt_polls() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flaky_receipt_reads_keep_polling() {
        let client = Arc::new(MockChainClient::new("mock://sepolia", 11155111).with_flaky_receipts(2));
        let broadcaster = broadcaster_with(client.clone(), settings());

        let receipt = broadcaster
            .broadcast("sepolia", &signed_transfer(11155111).await)
            .await
            .unwrap();

        assert_eq!(receipt.status, ReceiptStatus::Success);
        assert_eq!(client.receipt_polls(), 3);
        assert_eq!(client.sent_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_failing_after_submit_keep_hash() {
        let client = Arc::new(
            MockChainClient::new("mock://sepolia", 11155111)
                .failing(ClientError::Transport("connection refused".into())),
        );
        let broadcaster = broadcaster_with(client.clone(), settings());
        let signed = signed_transfer(11155111).await;

        let err = broadcaster.broadcast("sepolia", &signed).await.unwrap_err();

        assert_eq!(client.sent_count(), 1);
        assert_eq!(err.kind(), ErrorKind::ConfirmationTimeout);
        let raw = alloy::hex::decode(signed.trim_start_matches("0x")).unwrap();
        assert_eq!(err.tx_hash(), Some(alloy::primitives::keccak256(&raw)));
        assert!(!err.is_retry_safe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_depth() {
        let client = Arc::new(
            MockChainClient::new("mock://sepolia", 11155111)
                .with_mined_at(Some(100))
                .with_block_number(100),
        );
        let broadcaster = broadcaster_with(
            client.clone(),
            BroadcastSettings {
                confirmation_blocks: 3,
                ..settings()
            },
        );

        let head_mover = {
            let client = client.clone();
            tokio::spawn(async move {
                for _ in 0..2 {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    client.advance_blocks(1);
                }
            })
        };

        let receipt = broadcaster
            .broadcast("sepolia", &signed_transfer(11155111).await)
            .await
            .unwrap();
        head_mover.await.unwrap();

        assert_eq!(receipt.block_number, Some(100));
        assert!(client.receipt_polls() >= 3);
    }

    #[tokio::test]
    async fn test_unsupported_chain() {
        let client = Arc::new(MockChainClient::new("mock://sepolia", 11155111));
        let broadcaster = broadcaster_with(client, settings());

        let err = broadcaster.broadcast("mainnet", "0x00").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedChain);
    }
}
