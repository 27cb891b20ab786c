pub mod error;
pub mod keyblock;
pub mod keychange;
pub mod link;
pub mod membership;
pub mod trusted_key;

pub use error::{ChainingError, PowOutcome, Result, StorageError, ValidationError};
pub use keyblock::{Keyblock, MemberChange};
pub use keychange::{
    BackKeychange, Keychange, KeychangeKind, LeaverKeychange, NewcomerKeychange, PacketBlob,
    UpdateKeychange,
};
pub use link::CertLink;
pub use membership::{Membership, MembershipKind};
pub use trusted_key::{KeyRow, TrustedKey};
