//! Turns "move this wallet's balance to the destination" into a fully
//! parameterized transfer, or a typed skip.

use std::sync::Arc;

use tracing::debug;

use crate::config::SweepConfig;
use crate::error::ChainError;
use crate::model::{SkipReason, TransferSpec, UnsignedTransfer, Wallet};
use crate::traits::{ChainClient, NonceKind};

/// What the builder decided for one attempt.
#[derive(Debug, Clone)]
pub enum BuildPlan {
    Transfer(UnsignedTransfer),
    Skip(SkipReason),
}

/// Stateless transaction planner. A fresh plan is produced per attempt so
/// the nonce is current and the gas price escalates with the attempt
/// number; nothing here mutates shared state.
#[derive(Clone)]
pub struct TransferBuilder {
    chain: Arc<dyn ChainClient>,
    config: SweepConfig,
    /// Token contract being swept; `None` sweeps the native asset.
    token: Option<String>,
}

impl TransferBuilder {
    pub fn new(chain: Arc<dyn ChainClient>, config: SweepConfig, token: Option<String>) -> Self {
        Self {
            chain,
            config,
            token,
        }
    }

    /// Gas price for `attempt` (1-based): the base price escalated by
    /// `escalation_step_pct` per retry. Strictly increasing in the attempt
    /// number, so a replacement is never priced at or below its
    /// predecessor.
    pub fn escalated_gas_price(&self, base: u128, attempt: u32) -> u128 {
        let retries = attempt.saturating_sub(1) as u128;
        base + base * retries * self.config.escalation_step_pct as u128 / 100
    }

    /// Gas limit with the configured safety buffer applied.
    pub fn buffered_gas_limit(&self, estimate: u64) -> u64 {
        estimate + estimate * self.config.gas_buffer_pct / 100
    }

    /// Plan one transfer attempt for `wallet`.
    ///
    /// Network errors propagate for the caller's backoff loop; estimation
    /// reverts come back as `Skip(WouldRevert)` because resubmitting an
    /// inherently failing transfer only burns gas.
    pub async fn build(&self, wallet: &Wallet, attempt: u32) -> Result<BuildPlan, ChainError> {
        let balance = self.chain.balance_of(&wallet.address).await?;
        let threshold = self.config.min_transfer as u128;
        if balance < threshold {
            return Ok(BuildPlan::Skip(SkipReason::BelowThreshold {
                balance,
                threshold,
            }));
        }

        // Pending, not latest: a rebuilt attempt must sequence after
        // anything this wallet still has queued in the mempool.
        let nonce = self
            .chain
            .nonce_of(&wallet.address, NonceKind::Pending)
            .await?;

        let spec = TransferSpec {
            from: wallet.address.clone(),
            to: self.config.destination.clone(),
            // For a native sweep the final value is only known after gas
            // is priced; estimate the plain transfer itself.
            value: if self.token.is_some() { balance } else { 0 },
            token: self.token.clone(),
        };

        let estimate = match self.chain.estimate_gas(&spec).await {
            Ok(units) => units,
            Err(ChainError::Estimation { reason }) => {
                return Ok(BuildPlan::Skip(SkipReason::WouldRevert { reason }));
            }
            Err(other) => return Err(other),
        };
        let gas_limit = self.buffered_gas_limit(estimate);

        let base_price = self.chain.gas_price().await?;
        let gas_price = self.escalated_gas_price(base_price, attempt);
        let gas_cost = gas_price.saturating_mul(gas_limit as u128);

        let value = match &self.token {
            Some(_) => {
                // Token sweeps move the full token balance; gas is paid
                // from the wallet's native balance, which must cover it.
                let native = self.chain.native_balance_of(&wallet.address).await?;
                if native < gas_cost {
                    return Ok(BuildPlan::Skip(SkipReason::InsufficientGas {
                        balance: native,
                        gas_cost,
                    }));
                }
                balance
            }
            None => {
                // Native sweeps pay gas out of the balance being moved:
                // the transferable amount is what remains after gas.
                if balance <= gas_cost {
                    return Ok(BuildPlan::Skip(SkipReason::InsufficientGas {
                        balance,
                        gas_cost,
                    }));
                }
                balance - gas_cost
            }
        };

        debug!(
            "built transfer for {}: value={} nonce={} gas_limit={} gas_price={} (attempt {})",
            wallet.address, value, nonce, gas_limit, gas_price, attempt
        );

        Ok(BuildPlan::Transfer(UnsignedTransfer {
            from: wallet.address.clone(),
            to: self.config.destination.clone(),
            value,
            nonce,
            gas_limit,
            gas_price,
            chain_id: self.chain.chain_id(),
            token: self.token.clone(),
        }))
    }
}
