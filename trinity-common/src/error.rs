//! Error taxonomy for the Trinity verification engine.
//!
//! Every library crate in the workspace returns [`TrinityError`]. Callers
//! branch on [`TrinityError::is_retryable`] and the HTTP layer maps
//! [`TrinityError::suggested_status_code`] onto responses.

use thiserror::Error;

use crate::ChainId;

pub type Result<T> = std::result::Result<T, TrinityError>;

#[derive(Debug, Error)]
pub enum TrinityError {
    /// Caller supplied missing or inconsistent predicate parameters.
    #[error("invalid predicate params: {0}")]
    InvalidPredicateParams(String),

    #[error("proof not found: {0}")]
    ProofNotFound(String),

    /// The proof's validity window has elapsed; a new proof is required.
    #[error("proof expired: {0}")]
    ProofExpired(String),

    /// Transient: the chain could not be reached.
    #[error("chain {chain} unavailable: {reason}")]
    ChainUnavailable { chain: ChainId, reason: String },

    /// Terminal for this chain's contribution to a verification.
    #[error("submission rejected by {chain}: {reason}")]
    SubmissionRejected { chain: ChainId, reason: String },

    #[error("cross-chain verification not found: {0}")]
    VerificationNotFound(String),

    #[error("unknown chain: {0}")]
    UnknownChain(String),

    /// A compare-and-set transition kept losing to concurrent writers.
    #[error("concurrent modification of {0}")]
    ConcurrentModification(String),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TrinityError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        TrinityError::InvalidPredicateParams(message.into())
    }

    pub fn unavailable(chain: ChainId, reason: impl Into<String>) -> Self {
        TrinityError::ChainUnavailable {
            chain,
            reason: reason.into(),
        }
    }

    pub fn rejected(chain: ChainId, reason: impl Into<String>) -> Self {
        TrinityError::SubmissionRejected {
            chain,
            reason: reason.into(),
        }
    }

    /// Get a machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            TrinityError::InvalidPredicateParams(_) => "INVALID_PREDICATE_PARAMS",
            TrinityError::ProofNotFound(_) => "PROOF_NOT_FOUND",
            TrinityError::ProofExpired(_) => "PROOF_EXPIRED",
            TrinityError::ChainUnavailable { .. } => "CHAIN_UNAVAILABLE",
            TrinityError::SubmissionRejected { .. } => "SUBMISSION_REJECTED",
            TrinityError::VerificationNotFound(_) => "VERIFICATION_NOT_FOUND",
            TrinityError::UnknownChain(_) => "UNKNOWN_CHAIN",
            TrinityError::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            TrinityError::Ledger(_) => "LEDGER_ERROR",
            TrinityError::Crypto(_) => "CRYPTO_ERROR",
            TrinityError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrinityError::ChainUnavailable { .. } | TrinityError::ConcurrentModification(_)
        )
    }

    /// Get HTTP status code suggestion.
    pub fn suggested_status_code(&self) -> u16 {
        match self {
            TrinityError::InvalidPredicateParams(_) => 400,
            TrinityError::UnknownChain(_) => 400,
            TrinityError::ProofNotFound(_) => 404,
            TrinityError::VerificationNotFound(_) => 404,
            TrinityError::ProofExpired(_) => 410,
            TrinityError::ConcurrentModification(_) => 409,
            TrinityError::SubmissionRejected { .. } => 422,
            TrinityError::ChainUnavailable { .. } => 503,
            TrinityError::Ledger(_) => 500,
            TrinityError::Crypto(_) => 500,
            TrinityError::Serialization(_) => 500,
        }
    }
}
