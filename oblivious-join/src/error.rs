//! The tagged error enum and propagation policy of the error handling design.

use thiserror::Error;

/// Errors surfaced by the oblivious join engine.
///
/// `InvalidArgument` and `InvariantViolated` are fatal precondition failures
/// and are always propagated to the caller unchanged. `CapacityExceeded`
/// carries the offending size so a caller can reconfigure and retry.
/// `CryptoFailure` wraps whatever the confidentiality collaborator reported;
/// the dispatcher rolls back re-encryption state for already-processed rows
/// before surfacing it. `OutOfMemory` is non-recoverable.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    #[error("capacity exceeded: requested {requested}, limit {limit}")]
    CapacityExceeded { requested: usize, limit: usize },

    #[error("crypto failure: {0}")]
    CryptoFailure(#[from] crate::crypto::CryptoError),

    #[error("out of memory")]
    OutOfMemory,
}

pub type Result<T> = std::result::Result<T, JoinError>;
