use consensus_core::errors::RuleError;
use consensus_core::Hash;
use database::DbError;
use thiserror::Error;

/// Errors surfaced by the chain-state engine.
///
/// `Rule` rejects a single block and is safe to report to whoever submitted it.
/// `Fatal` means persisted state can no longer be trusted: the worker stops and
/// the node must be rebuilt.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("rule violation: {0}")]
    Rule(#[from] RuleError),

    #[error("internal consistency failure: {0}")]
    Fatal(String),

    #[error("storage error: {0}")]
    Db(#[from] DbError),

    #[error("dag provider error: {0}")]
    Dag(String),

    #[error("chain is shutting down")]
    ShuttingDown,

    #[error("block {0} was in flight when the node stopped; a rebuild is required")]
    DirtyShutdown(Hash),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ChainError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ChainError::Fatal(_))
    }

    pub fn rule(&self) -> Option<&RuleError> {
        match self {
            ChainError::Rule(err) => Some(err),
            _ => None,
        }
    }

    /// Storage failures after the DAG already accepted a block leave memory and
    /// disk out of step, so they are promoted to fatal.
    pub fn escalate(self) -> Self {
        match self {
            ChainError::Dag(msg) => ChainError::Fatal(format!("dag provider failed mid-commit: {}", msg)),
            ChainError::Db(err) => ChainError::Fatal(format!("storage failed mid-commit: {}", err)),
            ChainError::Io(err) => ChainError::Fatal(format!("io failed mid-commit: {}", err)),
            other => other,
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Shorthand for an invariant violation.
pub(crate) fn fatal<T>(msg: impl Into<String>) -> ChainResult<T> {
    Err(ChainError::Fatal(msg.into()))
}
