//! Preconditions checked by the command layer before touching the chain or
//! the container engine.

use automation_contracts::ContractError;
use automation_core::VerifiableLoadType;
use automation_node::NodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("no LinkToken in this environment; run `contract link deploy-token` or `set-token-address`")]
    LinkTokenNotAvailable,

    #[error("no {0} in this environment; deploy it or set its address")]
    FeedNotAvailable(&'static str),

    #[error("no Registry in this environment; run `contract registry deploy` or `set-address`")]
    RegistryNotAvailable,

    #[error("no Registrar in this environment; run `contract registrar deploy` or `set-address`")]
    RegistrarNotAvailable,

    #[error("no {0} verifiable load contract in this environment")]
    VerifiableLoadNotAvailable(VerifiableLoadType),

    #[error("no bootstrap node in this environment; run `network bootstrap set` first")]
    BootstrapNotAvailable,

    #[error("no participants in this environment; run `network participant add` first")]
    NoParticipants,

    #[error("no key with alias {0:?} in the key vault")]
    KeyNotFound(String),

    #[error("no node named {0:?}")]
    NodeNotFound(String),

    #[error("node {0} has no account address; bring it up first")]
    NodeAddressUnknown(String),

    #[error("failed to collect keys from {node}")]
    NodeUnreachable {
        node: String,
        #[source]
        source: NodeError,
    },

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("operation cancelled")]
    Cancelled,
}
