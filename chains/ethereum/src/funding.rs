//! Gas refill side-flow: top up wallets whose native balance has fallen
//! below a USD floor, paid from a dedicated funding wallet.
//!
//! Runs sequentially on purpose. Every transfer leaves the same funding
//! wallet, so the sends must be nonce-ordered, and each one waits for its
//! receipt before the next is built.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sweep_core::{
    with_retry, BackoffConfig, ChainClient, NonceKind, TransferSigner, UnsignedTransfer, Wallet,
};
use tracing::{info, warn};

const WEI_PER_ETH: f64 = 1e18;

#[derive(Debug, Clone)]
pub struct RefillConfig {
    /// Wallets valued below this many USD of native balance get topped up.
    pub floor_usd: f64,
    /// Top-up amount in wei.
    pub topup_wei: u128,
    /// Key handle of the funding wallet.
    pub funder: String,
    pub native_symbol: String,
    pub receipt_timeout_secs: u64,
}

#[derive(Debug, Default)]
pub struct RefillReport {
    pub checked: usize,
    pub refilled: usize,
    pub failed: usize,
}

pub struct GasRefiller {
    chain: Arc<dyn ChainClient>,
    signer: Arc<dyn TransferSigner>,
    oracle: Arc<dyn sweep_core::PriceOracle>,
    config: RefillConfig,
}

impl GasRefiller {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        signer: Arc<dyn TransferSigner>,
        oracle: Arc<dyn sweep_core::PriceOracle>,
        config: RefillConfig,
    ) -> Self {
        Self {
            chain,
            signer,
            oracle,
            config,
        }
    }

    /// Check every wallet and top up the ones below the floor.
    pub async fn run(&self, wallets: &[Wallet]) -> Result<RefillReport> {
        let price = self
            .oracle
            .asset_price_usd(&self.config.native_symbol)
            .await
            .context("price oracle unavailable")?;
        info!(
            "Refill check: 1 {} = {:.2} USD, floor {:.2} USD",
            self.config.native_symbol, price, self.config.floor_usd
        );

        let mut report = RefillReport::default();
        for wallet in wallets {
            report.checked += 1;
            match self.refill_if_low(wallet, price).await {
                Ok(true) => report.refilled += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!("refill failed for {} (continuing): {:#}", wallet.address, e);
                }
            }
        }

        info!(
            "Refill done: {} checked, {} topped up, {} failed",
            report.checked, report.refilled, report.failed
        );
        Ok(report)
    }

    async fn refill_if_low(&self, wallet: &Wallet, price_usd: f64) -> Result<bool> {
        let chain = Arc::clone(&self.chain);
        let address = wallet.address.clone();
        let balance = with_retry(
            BackoffConfig::new(500, 5_000),
            2,
            "native balance query",
            move || {
                let chain = Arc::clone(&chain);
                let address = address.clone();
                async move { Ok(chain.native_balance_of(&address).await?) }
            },
        )
        .await?;

        let balance_usd = balance as f64 / WEI_PER_ETH * price_usd;
        if balance_usd >= self.config.floor_usd {
            return Ok(false);
        }
        info!(
            "{} holds {:.2} USD of gas, topping up {} wei",
            wallet.address, balance_usd, self.config.topup_wei
        );

        let funder = &self.config.funder;
        let nonce = self.chain.nonce_of(funder, NonceKind::Pending).await?;
        let gas_price = self.chain.gas_price().await?;

        let transfer = UnsignedTransfer {
            from: funder.clone(),
            to: wallet.address.clone(),
            value: self.config.topup_wei,
            nonce,
            gas_limit: 21_000,
            gas_price,
            chain_id: self.chain.chain_id(),
            token: None,
        };

        let signed = self.signer.sign(&transfer, funder).await?;
        let tx_id = self.chain.submit(&signed).await?;
        let receipt = self
            .chain
            .wait_for_receipt(
                &tx_id,
                Duration::from_secs(self.config.receipt_timeout_secs),
            )
            .await?;

        if !receipt.success {
            anyhow::bail!("top-up {} reverted", tx_id);
        }
        info!("Topped up {} with tx {}", wallet.address, tx_id);
        Ok(true)
    }
}
