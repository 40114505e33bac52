//! Balance report: token + native holdings of every enabled wallet as a
//! JSON document for the operator.

use std::sync::Arc;

use anyhow::Result;
use sweep_core::{ChainClient, Wallet};
use tracing::warn;

const WEI_PER_ETH: f64 = 1e18;

pub async fn balance_report(
    chain: Arc<dyn ChainClient>,
    wallets: &[Wallet],
    token_symbol: Option<&str>,
    token_decimals: u32,
) -> Result<serde_json::Value> {
    let mut entries = Vec::new();

    for wallet in wallets {
        let swept = match chain.balance_of(&wallet.address).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!("balance query failed for {}: {}", wallet.address, e);
                0
            }
        };
        let native = match chain.native_balance_of(&wallet.address).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!("native balance query failed for {}: {}", wallet.address, e);
                0
            }
        };

        let mut entry = serde_json::json!({
            "name": wallet.name,
            "address": wallet.address,
            "native": native as f64 / WEI_PER_ETH,
        });
        if let Some(symbol) = token_symbol {
            entry[symbol] = serde_json::json!(swept as f64 / 10f64.powi(token_decimals as i32));
        }
        entries.push(entry);
    }

    Ok(serde_json::json!({ "wallets": entries }))
}
