//! Error types for the chain gateway.

use thiserror::Error;

/// Result type alias for chain gateway operations.
pub type ChainResult<T> = Result<T, ChainError>;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("failed to connect to chain: {0}")]
    NetworkConnection(String),

    #[error("failed to derive public key: {0}")]
    PublicKeyCasting(String),

    #[error("client interaction failed: {0}")]
    ClientInteraction(String),

    #[error("transaction failed: {link}")]
    ChainTransaction { hash: String, link: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid exponent: {0}")]
    ExponentParse(String),

    #[error("operation cancelled")]
    Cancelled,
}
