//! Ethers-backed chain client.
//!
//! One `Provider<Http>` shared read-only across workers; every query is
//! idempotent. Submission errors are classified by the node's message so
//! the coordinator can tell a transient transport fault from a rejection
//! it must not blindly retry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use sweep_core::{
    classify_rejection, ChainError, NonceKind, Receipt, RejectionReason, SignedTransfer,
    SweepMetrics, TransferSpec,
};
use tracing::debug;

use crate::erc20;

/// Node messages that mean "the transaction was refused", as opposed to a
/// transport fault worth retrying.
const REJECTION_PATTERNS: [&str; 8] = [
    "nonce too low",
    "already known",
    "already imported",
    "underpriced",
    "replacement transaction",
    "insufficient funds",
    "intrinsic gas too low",
    "exceeds block gas limit",
];

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct EthereumClient {
    provider: Provider<Http>,
    endpoint: String,
    chain_id: u64,
    /// Token contract being swept; `None` sweeps the native asset.
    token: Option<Address>,
    metrics: Arc<SweepMetrics>,
}

impl EthereumClient {
    pub fn new(rpc_url: &str, chain_id: u64, token: Option<Address>) -> anyhow::Result<Self> {
        let provider = Provider::new(Http::new(reqwest::Url::parse(rpc_url)?));
        Ok(Self {
            provider,
            endpoint: rpc_url.to_string(),
            chain_id,
            token,
            metrics: Arc::new(SweepMetrics::default()),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<SweepMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    fn network_error(&self, e: impl std::fmt::Display) -> ChainError {
        ChainError::Network {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        }
    }

    fn parse_address(&self, address: &str) -> Result<Address, ChainError> {
        address.parse().map_err(|_| ChainError::Rejected {
            reason: RejectionReason::Other(format!("invalid address '{}'", address)),
        })
    }

    fn classify_submit_error(&self, e: ProviderError) -> ChainError {
        let message = e.to_string();
        let lowered = message.to_lowercase();
        if REJECTION_PATTERNS.iter().any(|p| lowered.contains(p)) {
            ChainError::Rejected {
                reason: classify_rejection(&message),
            }
        } else {
            self.network_error(message)
        }
    }

    /// Shape the transfer intent into a call the node can estimate or
    /// execute: a contract `transfer` for tokens, a plain value transfer
    /// otherwise.
    fn typed_request(&self, spec: &TransferSpec) -> Result<TypedTransaction, ChainError> {
        let from = self.parse_address(&spec.from)?;
        let to = self.parse_address(&spec.to)?;

        let request = match self.token {
            Some(token) => {
                let data = erc20::encode_transfer(to, U256::from(spec.value))
                    .map_err(|e| self.network_error(e))?;
                TransactionRequest::new().from(from).to(token).data(data)
            }
            None => TransactionRequest::new()
                .from(from)
                .to(to)
                .value(U256::from(spec.value)),
        };
        Ok(request.into())
    }

    async fn timed<T, F>(&self, fut: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let start = Instant::now();
        let result = fut.await;
        self.metrics.record_rpc_latency(start.elapsed());
        result
    }
}

fn to_u128(value: U256) -> u128 {
    if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.as_u128()
    }
}

#[async_trait]
impl sweep_core::ChainClient for EthereumClient {
    async fn balance_of(&self, address: &str) -> Result<u128, ChainError> {
        let owner = self.parse_address(address)?;
        match self.token {
            Some(token) => {
                let data = erc20::encode_balance_of(owner).map_err(|e| self.network_error(e))?;
                let call: TypedTransaction =
                    TransactionRequest::new().to(token).data(data).into();
                let output = self
                    .timed(self.provider.call(&call, None))
                    .await
                    .map_err(|e| self.network_error(e))?;
                let balance =
                    erc20::decode_balance(&output).map_err(|e| self.network_error(e))?;
                Ok(to_u128(balance))
            }
            None => self.native_balance_of(address).await,
        }
    }

    async fn native_balance_of(&self, address: &str) -> Result<u128, ChainError> {
        let owner = self.parse_address(address)?;
        let balance = self
            .timed(self.provider.get_balance(owner, None))
            .await
            .map_err(|e| self.network_error(e))?;
        Ok(to_u128(balance))
    }

    async fn nonce_of(&self, address: &str, kind: NonceKind) -> Result<u64, ChainError> {
        let owner = self.parse_address(address)?;
        let block = match kind {
            NonceKind::Pending => BlockNumber::Pending,
            NonceKind::Latest => BlockNumber::Latest,
        };
        let nonce = self
            .timed(self.provider.get_transaction_count(owner, Some(block.into())))
            .await
            .map_err(|e| self.network_error(e))?;
        Ok(nonce.as_u64())
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        let price = self
            .timed(self.provider.get_gas_price())
            .await
            .map_err(|e| self.network_error(e))?;
        Ok(to_u128(price))
    }

    async fn estimate_gas(&self, spec: &TransferSpec) -> Result<u64, ChainError> {
        let call = self.typed_request(spec)?;
        match self.timed(self.provider.estimate_gas(&call, None)).await {
            Ok(units) => Ok(units.as_u64()),
            Err(e) => {
                let message = e.to_string();
                let lowered = message.to_lowercase();
                // A revert during estimation means the transfer itself
                // cannot succeed; everything else is transport trouble.
                if lowered.contains("revert")
                    || lowered.contains("insufficient funds")
                    || lowered.contains("execution reverted")
                {
                    Err(ChainError::Estimation { reason: message })
                } else {
                    Err(self.network_error(message))
                }
            }
        }
    }

    async fn submit(&self, tx: &SignedTransfer) -> Result<String, ChainError> {
        let raw = Bytes::from(tx.raw.clone());
        match self.timed(self.provider.send_raw_transaction(raw)).await {
            Ok(pending) => {
                let tx_id = format!("{:?}", pending.tx_hash());
                debug!("submitted {} for {}", tx_id, tx.transfer.from);
                Ok(tx_id)
            }
            Err(e) => Err(self.classify_submit_error(e)),
        }
    }

    async fn wait_for_receipt(
        &self,
        tx_id: &str,
        timeout: Duration,
    ) -> Result<Receipt, ChainError> {
        let hash: TxHash = tx_id.parse().map_err(|_| ChainError::Rejected {
            reason: RejectionReason::Other(format!("invalid transaction id '{}'", tx_id)),
        })?;

        let started = Instant::now();
        loop {
            match self
                .timed(self.provider.get_transaction_receipt(hash))
                .await
            {
                Ok(Some(receipt)) => {
                    return Ok(Receipt {
                        tx_id: tx_id.to_string(),
                        success: receipt.status == Some(U64::from(1)),
                        block_number: receipt.block_number.map(|n| n.as_u64()),
                    });
                }
                Ok(None) => {}
                Err(e) => return Err(self.network_error(e)),
            }

            if started.elapsed() >= timeout {
                return Err(ChainError::ReceiptTimeout {
                    tx_id: tx_id.to_string(),
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL.min(timeout)).await;
        }
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }
}
