//! # Sweep Core - Fund Consolidation Engine
//!
//! Chain-agnostic engine that consolidates balances from a pool of
//! custodial wallets into one destination: concurrent balance checks,
//! safe transaction parameterization (pending nonce, buffered gas limit,
//! escalating gas price), bounded-retry submission, and per-wallet
//! failure isolation. Chain access, signing, wallet storage, and audit
//! recording sit behind traits implemented by chain crates.
//!
//! ## Modules
//!
//! - [`builder`] - Transaction planning (threshold, nonce, gas, net value)
//! - [`config`] - Sweep tunables and validation
//! - [`coordinator`] - Bounded worker fan-out and outcome aggregation
//! - [`database`] - SQLite audit sink
//! - [`error`] - Typed error handling with thiserror
//! - [`metrics`] - Pipeline and RPC counters
//! - [`model`] - Wallets, transfers, outcomes, runs
//! - [`security`] - Wallet file encryption
//! - [`traits`] - Collaborator trait definitions
//! - [`utils`] - Utility modules (retry, rate limiting, logging, store)

// Module declarations - internal modules marked pub(crate)
pub mod builder;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod error;
pub mod metrics;
pub mod model;
pub mod security;
pub mod traits;
pub(crate) mod utils;

// Selective exports - only public API types
pub use builder::{BuildPlan, TransferBuilder};
pub use config::{SweepConfig, WalletSource};
pub use coordinator::SweepCoordinator;
pub use database::SqliteAuditSink;
pub use error::{
    classify_rejection, ChainError, ConfigError, DatabaseError, RejectionReason, SignerError,
    StoreError, SweepError,
};
pub use metrics::{MetricsSnapshot, SweepMetrics};
pub use model::{
    FailureReason, Receipt, SignedTransfer, SkipReason, SweepRun, TransferOutcome, TransferSpec,
    TransferStatus, UnsignedTransfer, Wallet,
};
pub use security::SecurityUtils;
pub use traits::{
    AuditSink, ChainClient, NonceKind, PriceOracle, Sleeper, TokioSleeper, TransferSigner,
    WalletStore,
};

// Utils are pub(crate) - only export specific public utilities
pub use utils::{setup_logger, setup_logger_with_file, EncryptedWalletStore, StoredWallet, SubmitLimiter};

// Export retry utilities for chain crates and testing
pub use utils::retry::{with_retry, BackoffConfig};
