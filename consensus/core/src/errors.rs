use thiserror::Error;

/// Identifies the consensus rule a block or transaction broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DuplicateBlock,
    BlockTooBig,
    BlockVersionTooOld,
    InvalidTime,
    TimeTooOld,
    TimeTooNew,
    UnexpectedDifficulty,
    DifficultyTooLow,
    HighHash,
    BadMerkleRoot,
    BadCheckpoint,
    CheckpointTimeTooOld,
    NoParents,
    TooManyParents,
    DuplicateParent,
    MissingParent,
    NoTransactions,
    FirstTxNotCoinbase,
    MultipleCoinbases,
    DuplicateTx,
    NoTxInputs,
    NoTxOutputs,
    BadTxOutValue,
    DuplicateTxInputs,
    UnfinalizedTx,
    MissingTxOut,
    ImmatureSpend,
    SpendTooHigh,
    BadFees,
    BadCoinbaseValue,
    BadTokenAmount,
    SideChainRejected,
    InvalidAncestorBlock,
}

/// A consensus rule violation. Rule errors are surfaced to the submitter and
/// are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{description}")]
pub struct RuleError {
    pub code: ErrorCode,
    pub description: String,
}

impl RuleError {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self { code, description: description.into() }
    }
}

pub type RuleResult<T> = Result<T, RuleError>;

/// Shorthand for returning a rule error from validation code.
#[macro_export]
macro_rules! rule_err {
    ($code:ident, $($arg:tt)*) => {
        Err($crate::errors::RuleError::new($crate::errors::ErrorCode::$code, format!($($arg)*)))
    };
}
