//! The sweep engine: fans the enabled wallet set out to a bounded worker
//! pool, runs one build → sign → submit → confirm pipeline per wallet,
//! and aggregates every outcome into a [`SweepRun`].
//!
//! Isolation is the design constraint everything here serves: a wallet's
//! pipeline owns its whole sequence (no two steps for one wallet run
//! concurrently, which is what keeps nonces collision-free), and one
//! pipeline failing can never cancel or delay another.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

use crate::builder::{BuildPlan, TransferBuilder};
use crate::config::SweepConfig;
use crate::error::{ChainError, RejectionReason};
use crate::metrics::SweepMetrics;
use crate::model::{
    FailureReason, SweepRun, TransferOutcome, TransferStatus, Wallet,
};
use crate::traits::{AuditSink, ChainClient, Sleeper, TokioSleeper, TransferSigner, WalletStore};
use crate::utils::rate_limiter::SubmitLimiter;
use crate::utils::retry::BackoffConfig;

/// Everything one wallet pipeline needs, cloneable into its task.
#[derive(Clone)]
struct PipelineCtx {
    chain: Arc<dyn ChainClient>,
    signer: Arc<dyn TransferSigner>,
    sleeper: Arc<dyn Sleeper>,
    limiter: Arc<SubmitLimiter>,
    builder: TransferBuilder,
    config: SweepConfig,
}

pub struct SweepCoordinator {
    chain: Arc<dyn ChainClient>,
    signer: Arc<dyn TransferSigner>,
    store: Arc<dyn WalletStore>,
    audit: Arc<dyn AuditSink>,
    sleeper: Arc<dyn Sleeper>,
    metrics: Arc<SweepMetrics>,
    config: SweepConfig,
    token: Option<String>,
}

impl SweepCoordinator {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        signer: Arc<dyn TransferSigner>,
        store: Arc<dyn WalletStore>,
        audit: Arc<dyn AuditSink>,
        config: SweepConfig,
    ) -> Self {
        Self {
            chain,
            signer,
            store,
            audit,
            sleeper: Arc::new(TokioSleeper),
            metrics: Arc::new(SweepMetrics::default()),
            config,
            token: None,
        }
    }

    /// Sweep an ERC-20 style token instead of the native asset.
    pub fn with_token(mut self, token_address: String) -> Self {
        self.token = Some(token_address);
        self
    }

    /// Replace the backoff sleeper; tests inject an instant one.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<SweepMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<SweepMetrics> {
        &self.metrics
    }

    /// Run one full sweep cycle. Returns only after every launched
    /// pipeline has reported; errors inside pipelines become outcomes,
    /// never early returns.
    pub async fn run(&self, cancel: CancellationToken) -> anyhow::Result<SweepRun> {
        self.config.validate()?;
        let wallets = self.store.list_enabled().await?;
        let started_at = Utc::now();
        let run_id = format!("sweep-{}", started_at.format("%Y%m%dT%H%M%S%.3f"));

        info!(
            "Starting sweep {}: {} wallets, concurrency {}",
            run_id,
            wallets.len(),
            self.config.concurrency
        );

        let ctx = PipelineCtx {
            chain: Arc::clone(&self.chain),
            signer: Arc::clone(&self.signer),
            sleeper: Arc::clone(&self.sleeper),
            limiter: Arc::new(SubmitLimiter::new(self.config.submit_tps)),
            builder: TransferBuilder::new(
                Arc::clone(&self.chain),
                self.config.clone(),
                self.token.clone(),
            ),
            config: self.config.clone(),
        };

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut set: JoinSet<TransferOutcome> = JoinSet::new();

        for wallet in wallets {
            // A cancelled run launches nothing further, but the wallets
            // it never reached still show up in the summary.
            if cancel.is_cancelled() {
                set.spawn(async move {
                    TransferOutcome {
                        wallet_address: wallet.address.clone(),
                        requested: 0,
                        status: TransferStatus::Failed(FailureReason::Cancelled),
                        tx_id: None,
                        attempts: 0,
                    }
                });
                continue;
            }

            let ctx = ctx.clone();
            let cancel = cancel.clone();
            let semaphore = Arc::clone(&semaphore);
            let metrics = Arc::clone(&self.metrics);
            let span = tracing::info_span!("pipeline", wallet = wallet.address.as_str());

            set.spawn(
                async move {
                    // Closed only when the JoinSet is dropped, which
                    // cannot happen while this task runs.
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .expect("sweep semaphore closed");

                    let start = std::time::Instant::now();
                    let outcome = wallet_pipeline(&ctx, &wallet, &cancel).await;
                    metrics.record_pipeline(
                        outcome.status.label(),
                        start.elapsed(),
                        outcome.attempts,
                    );
                    outcome
                }
                .instrument(span),
            );
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => {
                    log_outcome(&outcome);
                    if let Err(e) = self.audit.record(&run_id, &outcome).await {
                        warn!(
                            "audit record failed for {} (continuing): {:#}",
                            outcome.wallet_address, e
                        );
                    }
                    outcomes.push(outcome);
                }
                Err(e) => {
                    // A panicked pipeline is that wallet's problem alone.
                    error!("wallet pipeline panicked: {:?}", e);
                }
            }
        }

        let run = SweepRun {
            run_id: run_id.clone(),
            outcomes,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            "Sweep {} finished in {:.1}s: {} succeeded, {} skipped, {} failed ({} unconfirmed)",
            run_id,
            run.duration_secs(),
            run.succeeded(),
            run.skipped(),
            run.failed(),
            run.unconfirmed(),
        );
        if run.unconfirmed() > 0 {
            warn!(
                "{} transfer(s) unconfirmed: reconcile on-chain before re-running, \
                 a blind re-run can double-send",
                run.unconfirmed()
            );
        }

        Ok(run)
    }
}

fn log_outcome(outcome: &TransferOutcome) {
    match &outcome.status {
        TransferStatus::Succeeded { tx_id } => info!(
            "Succeeded [{}] {} units in {} attempt(s). Tx: {}",
            outcome.wallet_address, outcome.requested, outcome.attempts, tx_id
        ),
        TransferStatus::Skipped(reason) => {
            info!("Skipped [{}] {}", outcome.wallet_address, reason)
        }
        TransferStatus::Failed(reason) => warn!(
            "Failed [{}] after {} attempt(s): {}",
            outcome.wallet_address, outcome.attempts, reason
        ),
    }
}

/// One wallet's strictly sequential pipeline:
/// `Pending -> Building -> Signing -> Submitted -> Confirming` with
/// terminal `Succeeded | Failed | Skipped`. Rebuilds the transaction for
/// every attempt so the nonce is refreshed and the gas price escalates.
async fn wallet_pipeline(
    ctx: &PipelineCtx,
    wallet: &Wallet,
    cancel: &CancellationToken,
) -> TransferOutcome {
    let backoff = BackoffConfig::new(ctx.config.backoff_base_ms, ctx.config.backoff_max_ms);
    let receipt_timeout = Duration::from_secs(ctx.config.receipt_timeout_secs);

    let mut requested: u128 = 0;
    let outcome = |status: TransferStatus, tx_id: Option<String>, attempts: u32, requested| {
        TransferOutcome {
            wallet_address: wallet.address.clone(),
            requested,
            status,
            tx_id,
            attempts,
        }
    };

    for attempt in 1..=ctx.config.max_attempts {
        if cancel.is_cancelled() {
            return outcome(
                TransferStatus::Failed(FailureReason::Cancelled),
                None,
                attempt - 1,
                requested,
            );
        }

        // Building
        let unsigned = match ctx.builder.build(wallet, attempt).await {
            Ok(BuildPlan::Skip(reason)) => {
                return outcome(TransferStatus::Skipped(reason), None, attempt, requested);
            }
            Ok(BuildPlan::Transfer(tx)) => tx,
            Err(e) if e.is_transient() => {
                warn!(
                    "build attempt {}/{} hit a transient fault: {}",
                    attempt, ctx.config.max_attempts, e
                );
                if backoff_or_cancelled(ctx, cancel, &backoff, attempt).await {
                    return outcome(
                        TransferStatus::Failed(FailureReason::Cancelled),
                        None,
                        attempt,
                        requested,
                    );
                }
                continue;
            }
            Err(ChainError::Rejected { reason }) => {
                return outcome(
                    TransferStatus::Failed(FailureReason::Rejected(reason)),
                    None,
                    attempt,
                    requested,
                );
            }
            Err(e) => {
                return outcome(
                    TransferStatus::Failed(FailureReason::Rejected(RejectionReason::Other(
                        e.to_string(),
                    ))),
                    None,
                    attempt,
                    requested,
                );
            }
        };
        requested = unsigned.value;

        // Signing. An invalid key handle cannot heal on retry.
        let signed = match ctx.signer.sign(&unsigned, &wallet.key_handle).await {
            Ok(signed) => signed,
            Err(e) => {
                return outcome(
                    TransferStatus::Failed(e.into()),
                    None,
                    attempt,
                    requested,
                );
            }
        };

        // Submitted
        ctx.limiter.acquire(&wallet.address).await;
        let tx_id = match ctx.chain.submit(&signed).await {
            Ok(tx_id) => tx_id,
            Err(ChainError::Network { reason, .. }) => {
                warn!(
                    "submit attempt {}/{} failed: {}",
                    attempt, ctx.config.max_attempts, reason
                );
                if backoff_or_cancelled(ctx, cancel, &backoff, attempt).await {
                    return outcome(
                        TransferStatus::Failed(FailureReason::Cancelled),
                        None,
                        attempt,
                        requested,
                    );
                }
                continue;
            }
            Err(ChainError::Rejected {
                reason: RejectionReason::NonceTooLow,
            }) => {
                // Stale nonce, not a network fault: rebuild with a fresh
                // pending nonce right away, no backoff.
                info!(
                    "submit attempt {}/{} raced on the nonce, rebuilding",
                    attempt, ctx.config.max_attempts
                );
                continue;
            }
            Err(ChainError::Rejected { reason }) => {
                return outcome(
                    TransferStatus::Failed(FailureReason::Rejected(reason)),
                    None,
                    attempt,
                    requested,
                );
            }
            Err(e) => {
                return outcome(
                    TransferStatus::Failed(FailureReason::Rejected(RejectionReason::Other(
                        e.to_string(),
                    ))),
                    None,
                    attempt,
                    requested,
                );
            }
        };

        // Confirming
        return match ctx.chain.wait_for_receipt(&tx_id, receipt_timeout).await {
            Ok(receipt) if receipt.success => outcome(
                TransferStatus::Succeeded {
                    tx_id: tx_id.clone(),
                },
                Some(tx_id),
                attempt,
                requested,
            ),
            Ok(_) => {
                // Mined but reverted. The same parameters would revert
                // again, so this is terminal.
                outcome(
                    TransferStatus::Failed(FailureReason::Reverted),
                    Some(tx_id),
                    attempt,
                    requested,
                )
            }
            Err(e) => {
                // Timeout or a transport fault mid-poll: the submission
                // may still land. Resubmitting here risks a double-send,
                // so surface it for manual reconciliation instead.
                warn!("receipt wait for {} inconclusive: {}", tx_id, e);
                outcome(
                    TransferStatus::Failed(FailureReason::Unconfirmed),
                    Some(tx_id),
                    attempt,
                    requested,
                )
            }
        };
    }

    outcome(
        TransferStatus::Failed(FailureReason::RetriesExhausted),
        None,
        ctx.config.max_attempts,
        requested,
    )
}

/// Sleep out the backoff for `attempt`, or return true if the run was
/// cancelled first.
async fn backoff_or_cancelled(
    ctx: &PipelineCtx,
    cancel: &CancellationToken,
    backoff: &BackoffConfig,
    attempt: u32,
) -> bool {
    let delay = backoff.delay_for_attempt(attempt);
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = ctx.sleeper.sleep(delay) => false,
    }
}
