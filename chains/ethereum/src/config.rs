use anyhow::Result;
use config::{Config, File};
use serde::Deserialize;
use sweep_core::SweepConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct EthConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Destination every wallet is consolidated into.
    pub destination: String,
    #[serde(default = "default_audit_db")]
    pub audit_db: String,
    /// Token being swept; absent means a native-asset sweep.
    pub token: Option<TokenConfig>,
    pub wallets: WalletFileConfig,
    #[serde(default)]
    pub sweep: SweepSettings,
    pub funding: Option<FundingConfig>,
}

fn default_audit_db() -> String {
    "sweep_audit.db".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub address: String,
    pub decimals: u32,
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletFileConfig {
    pub path: String,
    /// Environment variable holding the store password; unset or empty
    /// means the file is plaintext.
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

fn default_password_env() -> String {
    "WALLET_PASSWORD".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    pub min_transfer: u64,
    pub gas_buffer_pct: u64,
    pub escalation_step_pct: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub receipt_timeout_secs: u64,
    pub concurrency: usize,
    pub submit_tps: u32,
}

impl Default for SweepSettings {
    fn default() -> Self {
        let defaults = SweepConfig::default();
        Self {
            min_transfer: defaults.min_transfer,
            gas_buffer_pct: defaults.gas_buffer_pct,
            escalation_step_pct: defaults.escalation_step_pct,
            max_attempts: defaults.max_attempts,
            backoff_base_ms: defaults.backoff_base_ms,
            backoff_max_ms: defaults.backoff_max_ms,
            receipt_timeout_secs: defaults.receipt_timeout_secs,
            concurrency: defaults.concurrency,
            submit_tps: defaults.submit_tps,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundingConfig {
    pub floor_usd: f64,
    pub topup_eth: f64,
    #[serde(default = "default_funder_env")]
    pub funder_key_env: String,
    #[serde(default = "default_native_symbol")]
    pub native_symbol: String,
}

fn default_funder_env() -> String {
    "FUNDING_PRIVATE_KEY".to_string()
}

fn default_native_symbol() -> String {
    "ETH".to_string()
}

impl EthConfig {
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .build()?;

        settings.try_deserialize().map_err(|e| anyhow::anyhow!(e))
    }

    pub fn to_sweep_config(&self) -> SweepConfig {
        SweepConfig {
            destination: self.destination.clone(),
            chain_id: self.chain_id,
            min_transfer: self.sweep.min_transfer,
            gas_buffer_pct: self.sweep.gas_buffer_pct,
            escalation_step_pct: self.sweep.escalation_step_pct,
            max_attempts: self.sweep.max_attempts,
            backoff_base_ms: self.sweep.backoff_base_ms,
            backoff_max_ms: self.sweep.backoff_max_ms,
            receipt_timeout_secs: self.sweep.receipt_timeout_secs,
            concurrency: self.sweep.concurrency,
            submit_tps: self.sweep.submit_tps,
        }
    }
}
