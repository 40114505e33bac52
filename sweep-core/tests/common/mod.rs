#![allow(dead_code)]

//! Shared in-memory collaborators for the engine tests. The chain mock is
//! scriptable per wallet: balances, nonces, submit results, and receipt
//! behavior are all injected, and every submitted transfer is recorded so
//! tests can assert on nonces and gas prices.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use sweep_core::{
    ChainError, NonceKind, Receipt, RejectionReason, SignedTransfer, SignerError, SkipReason,
    StoreError, TransferOutcome, TransferSpec, TransferStatus, UnsignedTransfer, Wallet,
};
use sweep_core::{AuditSink, ChainClient, Sleeper, TransferSigner, WalletStore};

pub fn wallet(address: &str) -> Wallet {
    Wallet {
        address: address.to_string(),
        key_handle: address.to_string(),
        name: format!("wallet-{}", &address[2..address.len().min(6)]),
        contact: "ops@example.com".to_string(),
        enabled: true,
    }
}

#[derive(Debug, Clone)]
pub enum SubmitPlan {
    Ok,
    Network,
    Reject(RejectionReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptPlan {
    Success,
    Reverted,
    Timeout,
}

#[derive(Default)]
struct ChainState {
    balances: HashMap<String, u128>,
    native_balances: HashMap<String, u128>,
    nonces: HashMap<String, u64>,
    submit_plans: HashMap<String, VecDeque<SubmitPlan>>,
    receipt_plans: HashMap<String, ReceiptPlan>,
    estimation_reverts: HashSet<String>,
    unreachable_addresses: HashSet<String>,
}

pub struct MockChainClient {
    state: Mutex<ChainState>,
    gas_price: u128,
    gas_estimate: u64,
    receipt_delay: Duration,
    tx_counter: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    tx_owners: Mutex<HashMap<String, String>>,
    pub submitted: Mutex<Vec<UnsignedTransfer>>,
    pub nonce_queries: Mutex<Vec<(String, NonceKind)>>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState::default()),
            gas_price: 10,
            gas_estimate: 50_000,
            receipt_delay: Duration::ZERO,
            tx_counter: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            tx_owners: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            nonce_queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_gas(mut self, gas_price: u128, gas_estimate: u64) -> Self {
        self.gas_price = gas_price;
        self.gas_estimate = gas_estimate;
        self
    }

    /// Delay inside receipt waits, to let pipelines overlap.
    pub fn with_receipt_delay(mut self, delay: Duration) -> Self {
        self.receipt_delay = delay;
        self
    }

    pub fn set_balance(&self, address: &str, balance: u128) {
        let mut state = self.state.lock().unwrap();
        state.balances.insert(address.to_string(), balance);
    }

    pub fn set_native_balance(&self, address: &str, balance: u128) {
        let mut state = self.state.lock().unwrap();
        state.native_balances.insert(address.to_string(), balance);
    }

    pub fn set_nonce(&self, address: &str, nonce: u64) {
        let mut state = self.state.lock().unwrap();
        state.nonces.insert(address.to_string(), nonce);
    }

    pub fn script_submits(&self, address: &str, plans: Vec<SubmitPlan>) {
        let mut state = self.state.lock().unwrap();
        state
            .submit_plans
            .insert(address.to_string(), plans.into());
    }

    pub fn script_receipt(&self, address: &str, plan: ReceiptPlan) {
        let mut state = self.state.lock().unwrap();
        state.receipt_plans.insert(address.to_string(), plan);
    }

    /// Every RPC touching this address fails with a network error.
    pub fn make_unreachable(&self, address: &str) {
        let mut state = self.state.lock().unwrap();
        state.unreachable_addresses.insert(address.to_string());
    }

    pub fn make_estimation_revert(&self, address: &str) {
        let mut state = self.state.lock().unwrap();
        state.estimation_reverts.insert(address.to_string());
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    pub fn max_concurrent_submissions(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn network_error(address: &str) -> ChainError {
        ChainError::Network {
            endpoint: "mock://rpc".to_string(),
            reason: format!("injected fault for {}", address),
        }
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn balance_of(&self, address: &str) -> Result<u128, ChainError> {
        let state = self.state.lock().unwrap();
        if state.unreachable_addresses.contains(address) {
            return Err(Self::network_error(address));
        }
        Ok(state.balances.get(address).copied().unwrap_or(0))
    }

    async fn native_balance_of(&self, address: &str) -> Result<u128, ChainError> {
        let state = self.state.lock().unwrap();
        if state.unreachable_addresses.contains(address) {
            return Err(Self::network_error(address));
        }
        Ok(state
            .native_balances
            .get(address)
            .or_else(|| state.balances.get(address))
            .copied()
            .unwrap_or(0))
    }

    async fn nonce_of(&self, address: &str, kind: NonceKind) -> Result<u64, ChainError> {
        self.nonce_queries
            .lock()
            .unwrap()
            .push((address.to_string(), kind));
        let state = self.state.lock().unwrap();
        if state.unreachable_addresses.contains(address) {
            return Err(Self::network_error(address));
        }
        Ok(state.nonces.get(address).copied().unwrap_or(0))
    }

    async fn gas_price(&self) -> Result<u128, ChainError> {
        Ok(self.gas_price)
    }

    async fn estimate_gas(&self, spec: &TransferSpec) -> Result<u64, ChainError> {
        let state = self.state.lock().unwrap();
        if state.unreachable_addresses.contains(&spec.from) {
            return Err(Self::network_error(&spec.from));
        }
        if state.estimation_reverts.contains(&spec.from) {
            return Err(ChainError::Estimation {
                reason: "execution reverted".to_string(),
            });
        }
        Ok(self.gas_estimate)
    }

    async fn submit(&self, tx: &SignedTransfer) -> Result<String, ChainError> {
        let from = tx.transfer.from.clone();
        self.submitted.lock().unwrap().push(tx.transfer.clone());

        let plan = {
            let mut state = self.state.lock().unwrap();
            state
                .submit_plans
                .get_mut(&from)
                .and_then(|q| q.pop_front())
                .unwrap_or(SubmitPlan::Ok)
        };

        match plan {
            SubmitPlan::Ok => {
                {
                    let mut state = self.state.lock().unwrap();
                    let nonce = state.nonces.entry(from.clone()).or_insert(0);
                    *nonce += 1;
                }
                let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_in_flight.fetch_max(current, Ordering::SeqCst);
                let id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
                let tx_id = format!("0xtx{:04x}", id);
                self.tx_owners
                    .lock()
                    .unwrap()
                    .insert(tx_id.clone(), from);
                Ok(tx_id)
            }
            SubmitPlan::Network => Err(Self::network_error(&from)),
            SubmitPlan::Reject(reason) => {
                if reason == RejectionReason::NonceTooLow {
                    // The chain is ahead of what the caller used.
                    let mut state = self.state.lock().unwrap();
                    let nonce = state.nonces.entry(from).or_insert(0);
                    *nonce += 1;
                }
                Err(ChainError::Rejected { reason })
            }
        }
    }

    async fn wait_for_receipt(
        &self,
        tx_id: &str,
        timeout: Duration,
    ) -> Result<Receipt, ChainError> {
        if !self.receipt_delay.is_zero() {
            tokio::time::sleep(self.receipt_delay).await;
        }

        let plan = {
            let owner = self.tx_owners.lock().unwrap().get(tx_id).cloned();
            let state = self.state.lock().unwrap();
            owner
                .and_then(|f| state.receipt_plans.get(&f).copied())
                .unwrap_or(ReceiptPlan::Success)
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match plan {
            ReceiptPlan::Success => Ok(Receipt {
                tx_id: tx_id.to_string(),
                success: true,
                block_number: Some(1),
            }),
            ReceiptPlan::Reverted => Ok(Receipt {
                tx_id: tx_id.to_string(),
                success: false,
                block_number: Some(1),
            }),
            ReceiptPlan::Timeout => Err(ChainError::ReceiptTimeout {
                tx_id: tx_id.to_string(),
                waited_ms: timeout.as_millis() as u64,
            }),
        }
    }

    fn chain_id(&self) -> u64 {
        31337
    }
}

/// Signer that "signs" by echoing the transfer; key handles not in the
/// allow list fail the way an invalid handle does in production.
pub struct MockSigner {
    bad_handles: HashSet<String>,
    pub sign_count: AtomicU64,
}

impl MockSigner {
    pub fn new() -> Self {
        Self {
            bad_handles: HashSet::new(),
            sign_count: AtomicU64::new(0),
        }
    }

    pub fn with_bad_handle(mut self, handle: &str) -> Self {
        self.bad_handles.insert(handle.to_string());
        self
    }
}

#[async_trait]
impl TransferSigner for MockSigner {
    async fn sign(
        &self,
        tx: &UnsignedTransfer,
        key_handle: &str,
    ) -> Result<SignedTransfer, SignerError> {
        if self.bad_handles.contains(key_handle) {
            return Err(SignerError::UnknownKeyHandle {
                handle: key_handle.to_string(),
            });
        }
        self.sign_count.fetch_add(1, Ordering::SeqCst);
        Ok(SignedTransfer {
            raw: vec![0xab; 32],
            transfer: tx.clone(),
        })
    }
}

pub struct MemoryStore {
    wallets: Vec<Wallet>,
}

impl MemoryStore {
    pub fn new(wallets: Vec<Wallet>) -> Self {
        Self { wallets }
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn list_enabled(&self) -> Result<Vec<Wallet>, StoreError> {
        Ok(self.wallets.iter().filter(|w| w.enabled).cloned().collect())
    }
}

pub struct MemorySink {
    pub records: Mutex<Vec<(String, TransferOutcome)>>,
    fail: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// A sink whose every insert fails; recording is best-effort so the
    /// sweep must shrug this off.
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn record(&self, run_id: &str, outcome: &TransferOutcome) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("sink unavailable");
        }
        self.records
            .lock()
            .unwrap()
            .push((run_id.to_string(), outcome.clone()));
        Ok(())
    }
}

/// Sleeper that returns immediately but remembers what it was asked.
pub struct InstantSleeper {
    pub requested: Mutex<Vec<Duration>>,
}

impl InstantSleeper {
    pub fn new() -> Self {
        Self {
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.requested.lock().unwrap().push(duration);
    }
}

/// Convenience: find one wallet's outcome in a finished run.
pub fn status_of<'a>(
    outcomes: &'a [TransferOutcome],
    address: &str,
) -> &'a TransferStatus {
    &outcomes
        .iter()
        .find(|o| o.wallet_address == address)
        .unwrap_or_else(|| panic!("no outcome for {}", address))
        .status
}

pub fn skip_reason(status: &TransferStatus) -> &SkipReason {
    match status {
        TransferStatus::Skipped(reason) => reason,
        other => panic!("expected Skipped, got {:?}", other),
    }
}
