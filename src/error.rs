use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Concurrent append conflict: {0}")]
    ConcurrentAppendConflict(String),

    #[error("Canonicalization error: {0}")]
    Canonicalization(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Canonicalization(format!("JSON serialization error: {}", err))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(format!("Database error: {}", err))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(format!("I/O error: {}", err))
    }
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

impl LedgerError {
    pub fn block_not_found(index: u64) -> Self {
        Self::NotFound(format!("block {} does not exist", index))
    }

    pub fn leaf_not_found(leaf: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("leaf {} is not part of the leaf set", leaf))
    }

    pub fn index_conflict(expected: u64, found: u64) -> Self {
        Self::ConcurrentAppendConflict(format!(
            "block index {} was claimed but the next free index is {}",
            found, expected
        ))
    }

    /// Whether the caller may resubmit the same append with a fresh tip.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentAppendConflict(_))
    }
}
