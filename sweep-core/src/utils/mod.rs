//! # Utilities Module
//!
//! Internal utility modules for the sweep-core crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

// Internal modules - not part of public API
pub(crate) mod logger;
pub(crate) mod rate_limiter;
pub(crate) mod retry;
pub(crate) mod wallet_store;

// Selective exports - only public utilities
pub use logger::{setup_logger, setup_logger_with_file};
pub use rate_limiter::SubmitLimiter;
pub use wallet_store::{EncryptedWalletStore, StoredWallet};
