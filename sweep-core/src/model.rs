//! Data model for one sweep cycle: wallets in, transfer outcomes out.
//!
//! Amounts are carried in the smallest on-chain unit as `u128`. Records are
//! created fresh per attempt and never mutated after construction.

use chrono::{DateTime, Utc};

use crate::error::{RejectionReason, SignerError};

/// A custodial wallet as seen by the sweep engine.
///
/// Owned by the wallet store; the coordinator only reads the
/// address / key-handle pair. The key handle is opaque here and is only
/// ever passed through to the signer.
#[derive(Debug, Clone)]
pub struct Wallet {
    pub address: String,
    pub key_handle: String,
    pub name: String,
    pub contact: String,
    pub enabled: bool,
}

/// The intent "move `value` from `from` to `to`", before any transaction
/// parameters exist. Used for gas estimation.
#[derive(Debug, Clone)]
pub struct TransferSpec {
    pub from: String,
    pub to: String,
    pub value: u128,
    /// Token contract address for an ERC-20 style sweep; `None` for a
    /// native-asset transfer.
    pub token: Option<String>,
}

/// A fully parameterized, unsigned transfer. Immutable once built;
/// discarded after signing. A fresh one is built for every attempt so the
/// nonce is current and the gas price escalates.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTransfer {
    pub from: String,
    pub to: String,
    pub value: u128,
    pub nonce: u64,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub chain_id: u64,
    pub token: Option<String>,
}

impl UnsignedTransfer {
    /// Worst-case gas cost in the smallest native unit.
    pub fn gas_cost(&self) -> u128 {
        self.gas_price.saturating_mul(self.gas_limit as u128)
    }
}

/// An opaque signed payload plus the transfer it was built from.
/// Submitted exactly once; never reused across attempts.
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub raw: Vec<u8>,
    pub transfer: UnsignedTransfer,
}

/// Confirmed on-chain record of a submitted transaction.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub tx_id: String,
    pub success: bool,
    pub block_number: Option<u64>,
}

/// Why a wallet was skipped without submitting anything.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Balance below the configured minimum; sweeping dust wastes gas.
    BelowThreshold { balance: u128, threshold: u128 },
    /// The gas payer cannot cover the gas cost, or the net transferable
    /// amount after gas would be zero or negative.
    InsufficientGas { balance: u128, gas_cost: u128 },
    /// Gas estimation says the transfer itself would revert.
    WouldRevert { reason: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::BelowThreshold { balance, threshold } => {
                write!(f, "below threshold ({} < {})", balance, threshold)
            }
            SkipReason::InsufficientGas { balance, gas_cost } => {
                write!(f, "insufficient gas ({} available, {} needed)", balance, gas_cost)
            }
            SkipReason::WouldRevert { reason } => write!(f, "would revert: {}", reason),
        }
    }
}

/// Why a wallet's pipeline ended without a confirmed transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The node rejected the transaction for a non-retryable reason.
    Rejected(RejectionReason),
    /// Mined but reverted. Retrying identical parameters wastes gas.
    Reverted,
    /// No receipt within the wait bound. Ambiguous: the transfer may have
    /// confirmed late. Requires manual reconciliation before re-running.
    Unconfirmed,
    /// The signer could not produce a signature for this wallet.
    Signing(String),
    /// Every attempt failed with a transient fault.
    RetriesExhausted,
    /// The run was cancelled before this pipeline could finish.
    Cancelled,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Rejected(r) => write!(f, "rejected: {}", r),
            FailureReason::Reverted => write!(f, "reverted on-chain"),
            FailureReason::Unconfirmed => write!(f, "unconfirmed (receipt wait timed out)"),
            FailureReason::Signing(msg) => write!(f, "signing failed: {}", msg),
            FailureReason::RetriesExhausted => write!(f, "retries exhausted"),
            FailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<SignerError> for FailureReason {
    fn from(e: SignerError) -> Self {
        FailureReason::Signing(e.to_string())
    }
}

/// Terminal status of one wallet's pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferStatus {
    Succeeded { tx_id: String },
    Skipped(SkipReason),
    Failed(FailureReason),
}

impl TransferStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TransferStatus::Succeeded { .. } => "Succeeded",
            TransferStatus::Skipped(_) => "Skipped",
            TransferStatus::Failed(_) => "Failed",
        }
    }

    /// Ambiguous outcomes need operator reconciliation before a re-run.
    pub fn is_unconfirmed(&self) -> bool {
        matches!(self, TransferStatus::Failed(FailureReason::Unconfirmed))
    }
}

/// Result of one wallet's pipeline in one sweep cycle.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub wallet_address: String,
    pub requested: u128,
    pub status: TransferStatus,
    pub tx_id: Option<String>,
    pub attempts: u32,
}

impl TransferOutcome {
    pub fn reason(&self) -> Option<String> {
        match &self.status {
            TransferStatus::Succeeded { .. } => None,
            TransferStatus::Skipped(r) => Some(r.to_string()),
            TransferStatus::Failed(r) => Some(r.to_string()),
        }
    }
}

/// One coordinator invocation: every wallet's outcome plus timing.
/// The unit of observability for a sweep.
#[derive(Debug, Clone)]
pub struct SweepRun {
    pub run_id: String,
    pub outcomes: Vec<TransferOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SweepRun {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, TransferStatus::Succeeded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, TransferStatus::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, TransferStatus::Failed(_)))
    }

    /// Failed pipelines whose transaction may still have landed.
    /// Reported separately so an operator reconciles before re-running.
    pub fn unconfirmed(&self) -> usize {
        self.count(TransferStatus::is_unconfirmed)
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    fn count(&self, pred: impl Fn(&TransferStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: TransferStatus) -> TransferOutcome {
        TransferOutcome {
            wallet_address: "0xabc".into(),
            requested: 1_000_000,
            status,
            tx_id: None,
            attempts: 1,
        }
    }

    #[test]
    fn run_counts_by_status() {
        let run = SweepRun {
            run_id: "run-1".into(),
            outcomes: vec![
                outcome(TransferStatus::Succeeded { tx_id: "0x1".into() }),
                outcome(TransferStatus::Skipped(SkipReason::BelowThreshold {
                    balance: 10,
                    threshold: 100,
                })),
                outcome(TransferStatus::Failed(FailureReason::Unconfirmed)),
                outcome(TransferStatus::Failed(FailureReason::Reverted)),
            ],
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        assert_eq!(run.succeeded(), 1);
        assert_eq!(run.skipped(), 1);
        assert_eq!(run.failed(), 2);
        assert_eq!(run.unconfirmed(), 1);
    }

    #[test]
    fn gas_cost_saturates() {
        let tx = UnsignedTransfer {
            from: "a".into(),
            to: "b".into(),
            value: 0,
            nonce: 0,
            gas_limit: u64::MAX,
            gas_price: u128::MAX,
            chain_id: 1,
            token: None,
        };
        assert_eq!(tx.gas_cost(), u128::MAX);
    }
}
