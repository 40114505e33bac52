use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ChainError, SignerError, StoreError};
use crate::model::{Receipt, SignedTransfer, TransferOutcome, TransferSpec, UnsignedTransfer, Wallet};

/// Which account state a nonce query reads.
///
/// `Pending` counts transactions already queued but unconfirmed, so a
/// rebuilt attempt sequences after anything still in the mempool from the
/// same address. `Latest` ignores queued transactions and exists for the
/// cancellation flow, which deliberately reuses a pending nonce. Every
/// build site in this crate uses `Pending`; mixing selectors at a single
/// call site is a nonce-collision hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceKind {
    Pending,
    Latest,
}

/// Read and write access to the ledger. Implementations are expected to be
/// cheap to share across workers (`Arc`) since every query is idempotent.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Balance of the swept asset (token balance in token mode, native
    /// balance otherwise). Unsigned by construction, never negative.
    async fn balance_of(&self, address: &str) -> Result<u128, ChainError>;

    /// Native-asset balance, used to check the gas payer can afford gas.
    /// Equal to [`Self::balance_of`] for a native-asset sweep.
    async fn native_balance_of(&self, address: &str) -> Result<u128, ChainError>;

    async fn nonce_of(&self, address: &str, kind: NonceKind) -> Result<u64, ChainError>;

    /// Current gas price in the smallest native unit.
    async fn gas_price(&self) -> Result<u128, ChainError>;

    /// Gas units the transfer needs. `ChainError::Estimation` when the
    /// call would revert; callers treat that as a definitive skip.
    async fn estimate_gas(&self, spec: &TransferSpec) -> Result<u64, ChainError>;

    /// Broadcast a signed transfer, returning the transaction id.
    async fn submit(&self, tx: &SignedTransfer) -> Result<String, ChainError>;

    /// Poll until the transaction is mined or `timeout` elapses
    /// (`ChainError::ReceiptTimeout`).
    async fn wait_for_receipt(&self, tx_id: &str, timeout: Duration) -> Result<Receipt, ChainError>;

    fn chain_id(&self) -> u64;
}

/// Produces a signed transaction blob from an unsigned transfer.
///
/// Stateless per call and safe to invoke concurrently for different key
/// handles. The one-pipeline-per-wallet design guarantees it is never
/// invoked concurrently for the same wallet.
#[async_trait]
pub trait TransferSigner: Send + Sync {
    async fn sign(
        &self,
        tx: &UnsignedTransfer,
        key_handle: &str,
    ) -> Result<SignedTransfer, SignerError>;
}

/// Sole source of wallet / key-handle pairs. Read-only per sweep run.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn list_enabled(&self) -> Result<Vec<Wallet>, StoreError>;
}

/// Receives structured records of completed transfers. Best-effort:
/// callers log failures and move on, never roll back or block the sweep.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, run_id: &str, outcome: &TransferOutcome) -> anyhow::Result<()>;
}

/// Spot price source for the funding side-flow.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn asset_price_usd(&self, symbol: &str) -> anyhow::Result<f64>;
}

/// Injectable sleep so backoff timing is testable without real timers.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
