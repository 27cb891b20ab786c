//! Block validation and Web-of-Trust state engine for a proof-of-work
//! secured identity keychain: a directed certification graph gates who
//! may join, a Merkle-rooted member set is carried in each block, and an
//! append-only chain of those blocks is accepted only through a single
//! serialized validation-then-apply path.

pub mod block;
pub mod config;
pub mod crypto;
pub mod keychange;
pub mod membership;
pub mod node;
pub mod pow;
pub mod storage;
pub mod types;
pub mod wot;

pub use block::{BlockApplier, BlockBuilder, BlockValidation, BlockValidator, NewcomerFilter};
pub use config::NodeConfig;
pub use crypto::{CryptoError, DecomposedKey, KeyOracle, SequoiaKeyOracle};
pub use keychange::{KeychangeValidator, ValidatedKeychange};
pub use membership::MembershipPool;
pub use node::{Clock, GenerationHandle, KeychainNode, SystemClock};
pub use pow::{PowEngine, PowState};
pub use types::{
    CertLink, ChainingError, Keyblock, Keychange, KeychangeKind, KeyRow, MemberChange,
    Membership, MembershipKind, NewcomerKeychange, PowOutcome, Result, StorageError, TrustedKey,
    UpdateKeychange, ValidationError,
};
pub use wot::WotGraph;
