//! Error types for the contract catalog.

use automation_chain::ChainError;
use thiserror::Error;

/// Result type alias for contract operations.
pub type ContractResult<T> = Result<T, ContractError>;

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("failed to initialize {contract}: {reason}")]
    Initialization { contract: String, reason: String },

    #[error("failed to deploy {contract}: {reason}")]
    Creation {
        contract: String,
        reason: String,
        #[source]
        source: Option<ChainError>,
    },

    #[error("failed to connect to {contract} at {address}: {reason}")]
    Connection {
        contract: String,
        address: String,
        reason: String,
    },

    #[error("failed to decode {contract} response: {reason}")]
    Decode { contract: String, reason: String },

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("operation cancelled")]
    Cancelled,
}

impl ContractError {
    pub(crate) fn creation(contract: &str, reason: impl std::fmt::Display) -> Self {
        ContractError::Creation {
            contract: contract.to_string(),
            reason: reason.to_string(),
            source: None,
        }
    }

    pub(crate) fn decode(contract: &str, err: impl std::fmt::Display) -> Self {
        ContractError::Decode {
            contract: contract.to_string(),
            reason: err.to_string(),
        }
    }

    /// Wrap a chain failure from a deployment step. The chain error stays
    /// reachable through `source()`.
    pub(crate) fn from_deploy(contract: &str, err: ChainError) -> Self {
        match err {
            ChainError::Cancelled => ContractError::Cancelled,
            other => ContractError::Creation {
                contract: contract.to_string(),
                reason: other.to_string(),
                source: Some(other),
            },
        }
    }

    /// Map a chain failure from a call or transaction.
    pub(crate) fn from_chain(err: ChainError) -> Self {
        match err {
            ChainError::Cancelled => ContractError::Cancelled,
            other => ContractError::Chain(other),
        }
    }
}
