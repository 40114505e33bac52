use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for one sweep cycle. Loaded from the chain crate's TOML file
/// and validated before the coordinator accepts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Destination every wallet is consolidated into.
    pub destination: String,
    pub chain_id: u64,
    /// Balances below this (smallest units) are skipped as dust.
    pub min_transfer: u64,
    /// Percent added on top of the gas estimate.
    pub gas_buffer_pct: u64,
    /// Percent the gas price grows per retry attempt.
    pub escalation_step_pct: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub receipt_timeout_secs: u64,
    /// Worker pool size; at most this many wallet pipelines run at once.
    pub concurrency: usize,
    /// Submission pacing for the shared RPC endpoint, transactions/second.
    pub submit_tps: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            destination: String::new(),
            chain_id: 1,
            min_transfer: 1_000_000,
            gas_buffer_pct: 20,
            escalation_step_pct: 10,
            max_attempts: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            receipt_timeout_secs: 120,
            concurrency: 8,
            submit_tps: 10,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destination.is_empty() {
            return Err(ConfigError::MissingField {
                field: "destination".into(),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.escalation_step_pct == 0 {
            return Err(ConfigError::InvalidValue {
                field: "escalation_step_pct".into(),
                reason: "replacement transactions must be priced strictly higher".into(),
            });
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(ConfigError::InvalidValue {
                field: "backoff_max_ms".into(),
                reason: "cap below base delay".into(),
            });
        }
        Ok(())
    }
}

/// Where wallet records come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalletSource {
    File { path: String, encrypted: bool },
    Env { key: String },
}
