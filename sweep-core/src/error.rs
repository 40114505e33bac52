//! # Core Error Types
//!
//! Centralized error definitions for the sweep-core crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Unified error type for sweep-core operations.
///
/// This enum wraps all specific error types and provides a unified
/// error interface for the application layer.
#[derive(Error, Debug)]
pub enum SweepError {
    #[error(transparent)]
    Config(ConfigError),

    #[error(transparent)]
    Chain(ChainError),

    #[error(transparent)]
    Signer(SignerError),

    #[error(transparent)]
    Store(StoreError),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<ConfigError> for SweepError {
    fn from(e: ConfigError) -> Self {
        SweepError::Config(e)
    }
}

impl From<ChainError> for SweepError {
    fn from(e: ChainError) -> Self {
        SweepError::Chain(e)
    }
}

impl From<SignerError> for SweepError {
    fn from(e: SignerError) -> Self {
        SweepError::Signer(e)
    }
}

impl From<StoreError> for SweepError {
    fn from(e: StoreError) -> Self {
        SweepError::Store(e)
    }
}

impl From<DatabaseError> for SweepError {
    fn from(e: DatabaseError) -> Self {
        SweepError::Database(e)
    }
}

/// Why a node rejected a submitted transaction.
///
/// `NonceTooLow` is a data-staleness condition: the pipeline refreshes the
/// nonce and retries immediately. Every other variant is terminal for the
/// attempt loop, since resubmitting identical parameters cannot succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    NonceTooLow,
    Underpriced,
    InsufficientFunds,
    Other(String),
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionReason::NonceTooLow => write!(f, "nonce too low"),
            RejectionReason::Underpriced => write!(f, "replacement transaction underpriced"),
            RejectionReason::InsufficientFunds => write!(f, "insufficient funds"),
            RejectionReason::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Errors surfaced by a chain client.
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    /// Transient transport failure. Safe to retry with backoff.
    #[error("RPC request to {endpoint} failed: {reason}")]
    Network { endpoint: String, reason: String },

    /// The node refused the transaction. Not retryable with the same
    /// parameters; see [`RejectionReason`].
    #[error("transaction rejected: {reason}")]
    Rejected { reason: RejectionReason },

    /// Gas estimation failed because the call would revert. Definitive
    /// skip for the wallet, never retried.
    #[error("gas estimation failed: {reason}")]
    Estimation { reason: String },

    /// No receipt within the wait bound. The outcome is unknown: the
    /// transaction may still confirm later.
    #[error("no receipt for {tx_id} after {waited_ms}ms")]
    ReceiptTimeout { tx_id: String, waited_ms: u64 },
}

impl ChainError {
    /// Whether the error is a transient fault worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Network { .. })
    }
}

/// Classify a raw node error message into a typed rejection reason.
///
/// The match patterns mirror what EVM nodes actually return for the
/// conditions the pipeline has to distinguish.
pub fn classify_rejection(message: &str) -> RejectionReason {
    let msg = message.to_lowercase();

    if msg.contains("nonce too low") || msg.contains("already known") {
        RejectionReason::NonceTooLow
    } else if msg.contains("underpriced") || msg.contains("replacement transaction") {
        RejectionReason::Underpriced
    } else if msg.contains("insufficient funds") {
        RejectionReason::InsufficientFunds
    } else {
        RejectionReason::Other(message.to_string())
    }
}

/// Signing failures. Fatal for the affected wallet, never retried.
#[derive(Error, Debug, Clone)]
pub enum SignerError {
    #[error("unknown key handle '{handle}'")]
    UnknownKeyHandle { handle: String },

    #[error("signing failed for {address}: {reason}")]
    Failed { address: String, reason: String },
}

/// Wallet store errors.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("wallet file not found: {path}")]
    FileNotFound { path: String },

    #[error("decryption failed for '{path}': {reason}")]
    DecryptionFailed { path: String, reason: String },

    #[error("invalid wallet file format in '{path}': {reason}")]
    InvalidFormat { path: String, reason: String },

    #[error("no key material for handle '{handle}'")]
    UnknownHandle { handle: String },

    #[error("I/O error on {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Invalid RPC URL format: '{url}'")]
    InvalidRpcUrl { url: String },

    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Database operation errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {msg}")]
    ConnectionFailed { msg: String },

    #[error("Query failed: {msg}")]
    QueryFailed { msg: String },

    #[error("Migration failed: {msg}")]
    MigrationFailed { msg: String },
}
