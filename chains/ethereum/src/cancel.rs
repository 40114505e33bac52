//! Replace a stuck transaction with a zero-value self-transfer.
//!
//! Reuses the wallet's `Latest` nonce on purpose: that is the slot the
//! stuck transaction occupies, and the network only accepts the
//! replacement because it is priced 20% above the current gas price.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sweep_core::{ChainClient, NonceKind, TransferSigner, UnsignedTransfer};
use tracing::info;

const CANCEL_GAS_LIMIT: u64 = 21_000;

pub async fn cancel_pending(
    chain: Arc<dyn ChainClient>,
    signer: Arc<dyn TransferSigner>,
    address: &str,
    receipt_timeout_secs: u64,
) -> Result<String> {
    let nonce = chain.nonce_of(address, NonceKind::Latest).await?;
    let gas_price = chain.gas_price().await?;
    let replacement_price = gas_price + gas_price / 5;

    info!(
        "Cancelling pending tx for {} at nonce {} (gas price {} -> {})",
        address, nonce, gas_price, replacement_price
    );

    let transfer = UnsignedTransfer {
        from: address.to_string(),
        to: address.to_string(),
        value: 0,
        nonce,
        gas_limit: CANCEL_GAS_LIMIT,
        gas_price: replacement_price,
        chain_id: chain.chain_id(),
        token: None,
    };

    let signed = signer.sign(&transfer, address).await?;
    let tx_id = chain.submit(&signed).await.context("replacement refused")?;

    let receipt = chain
        .wait_for_receipt(&tx_id, Duration::from_secs(receipt_timeout_secs))
        .await
        .context("replacement not confirmed in time")?;
    if !receipt.success {
        anyhow::bail!("replacement {} reverted", tx_id);
    }

    info!("Cancelled: replacement mined as {}", tx_id);
    Ok(tx_id)
}
