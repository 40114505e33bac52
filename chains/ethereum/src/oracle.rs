//! CoinGecko spot-price client, used to decide which wallets are running
//! low on gas in USD terms.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sweep_core::{with_retry, BackoffConfig, PriceOracle};

pub struct CoinGeckoOracle {
    http: reqwest::Client,
    base_url: String,
}

impl CoinGeckoOracle {
    pub fn new() -> Self {
        Self::with_base_url("https://api.coingecko.com")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn coin_id(symbol: &str) -> String {
        match symbol.to_uppercase().as_str() {
            "ETH" => "ethereum".to_string(),
            "BTC" => "bitcoin".to_string(),
            "USDC" => "usd-coin".to_string(),
            "USDT" => "tether".to_string(),
            other => other.to_lowercase(),
        }
    }
}

impl Default for CoinGeckoOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceOracle for CoinGeckoOracle {
    async fn asset_price_usd(&self, symbol: &str) -> Result<f64> {
        let id = Self::coin_id(symbol);
        let url = format!(
            "{}/api/v3/simple/price?ids={}&vs_currencies=usd",
            self.base_url, id
        );

        let body = with_retry(
            BackoffConfig::new(500, 5_000),
            2,
            "price query",
            || async {
                let response = self.http.get(&url).send().await?.error_for_status()?;
                Ok(response.json::<serde_json::Value>().await?)
            },
        )
        .await?;

        body.get(&id)
            .and_then(|v| v.get("usd"))
            .and_then(|v| v.as_f64())
            .with_context(|| format!("no USD price for '{}' in oracle response", symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_map_to_coingecko_ids() {
        assert_eq!(CoinGeckoOracle::coin_id("ETH"), "ethereum");
        assert_eq!(CoinGeckoOracle::coin_id("eth"), "ethereum");
        assert_eq!(CoinGeckoOracle::coin_id("USDC"), "usd-coin");
        assert_eq!(CoinGeckoOracle::coin_id("dogecoin"), "dogecoin");
    }
}
