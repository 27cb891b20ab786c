use thiserror::Error;

/// Reasons a candidate block can fail validation (spec §7).
///
/// Every variant is terminal for the block under test: no partial mutation
/// is ever performed when one of these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("bad chaining: {0}")]
    BadChaining(#[from] ChainingError),

    #[error("timestamp {block_ts} is outside the accepted window around {now} (±{ts_interval}s)")]
    BadTimestamp {
        block_ts: i64,
        now: i64,
        ts_interval: i64,
    },

    #[error("proof of work: hash has {actual} leading zero hex digits, needs {required}")]
    BadPoW { actual: u32, required: u32 },

    #[error("issuer {0} is not eligible to sign this block")]
    BadIssuer(String),

    #[error("bad keychange for {fingerprint}: {reason}")]
    BadKeychange { fingerprint: String, reason: String },

    #[error("keychange kind {0:?} is not implemented")]
    NotImplementedKeychange(crate::types::keychange::KeychangeKind),

    #[error("cryptographic operation failed: {0}")]
    BadCrypto(String),

    #[error("web of trust would be unstable: {0}")]
    WoTUnstable(String),

    #[error("kicked-set mismatch: {0}")]
    BadKickSet(String),

    #[error("membersChanges incoherent: {0}")]
    BadMembersChanges(String),

    #[error("block {0} was already applied")]
    AlreadySeen(u64),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Subtypes of chain-linkage failure (spec §4.4 step 1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainingError {
    #[error("chain has no tip yet; block must be the genesis (number = 0)")]
    RequiresRoot,
    #[error("block number {got} is not greater than the current tip {tip}")]
    TooLate { got: u64, tip: u64 },
    #[error("block number {got} skips ahead of the expected {expected}")]
    TooEarly { got: u64, expected: u64 },
    #[error("previousHash {got} does not match tip hash {expected}")]
    BadPrevHash { got: String, expected: String },
    #[error("previousIssuer {got} does not match tip issuer {expected}")]
    BadPrevIssuer { got: String, expected: String },
}

/// Failures surfaced by the storage traits consumed from §6.
///
/// Storage errors always propagate; a block that triggers one is never
/// marked applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("backend failure: {0}")]
    Backend(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result alias used throughout the crate's public API.
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Cancellation outcome of the proof-of-work search (spec §4.7).
///
/// Not a [`ValidationError`]: losing a PoW race to a competing block is an
/// expected, non-exceptional event communicated back to the caller of
/// [`crate::pow::PowEngine::prove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowOutcome<T> {
    Found(T),
    Cancelled,
}
