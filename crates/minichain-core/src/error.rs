use thiserror::Error;

/// Why a transfer was refused at intake. The pool is untouched when this is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTransaction {
    #[error("transaction has no sender")]
    MissingSender,
    #[error("transaction has no recipient")]
    MissingRecipient,
    #[error("transaction amount must be positive")]
    NonPositiveAmount,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] InvalidTransaction),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// The first inconsistency found while re-deriving the chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainCorruption {
    #[error("block {index} has been tampered with: stored hash {stored}, recomputed {computed}")]
    HashMismatch {
        index: u64,
        stored: String,
        computed: String,
    },
    #[error("block {index} is not linked to its predecessor: expected previous hash {expected}, found {found}")]
    BrokenLink {
        index: u64,
        expected: String,
        found: String,
    },
}

impl ChainCorruption {
    /// Chain position of the offending block.
    pub fn index(&self) -> u64 {
        match self {
            ChainCorruption::HashMismatch { index, .. } | ChainCorruption::BrokenLink { index, .. } => {
                *index
            }
        }
    }
}
