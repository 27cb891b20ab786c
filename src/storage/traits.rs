use crate::types::{CertLink, Keyblock, Membership, Result, TrustedKey};

/// Durable keyblock chain (spec §6). A single writer serializes every
/// mutation through [`crate::node::KeychainNode`]; implementations don't
/// need their own internal locking beyond what atomicity requires.
pub trait BlockStore: Send + Sync {
    fn current(&self) -> Result<Option<Keyblock>>;
    fn find_by_number(&self, number: u64) -> Result<Option<Keyblock>>;
    fn last_of_issuer(&self, issuer: &str) -> Result<Option<Keyblock>>;
    fn save(&self, block: Keyblock) -> Result<()>;
}

/// Current member set and pending-kick bookkeeping (spec §6).
pub trait MemberIndex: Send + Sync {
    fn is_member(&self, fingerprint: &str) -> Result<bool>;
    fn get_members(&self) -> Result<Vec<String>>;
    fn add_member(&self, fingerprint: &str) -> Result<()>;
    fn remove_member(&self, fingerprint: &str) -> Result<()>;
    fn set_kicked(&self, fingerprint: &str, distanced: Vec<String>) -> Result<()>;
    fn unset_kicked(&self, fingerprint: &str) -> Result<()>;
    fn get_to_be_kicked(&self) -> Result<Vec<String>>;
}

/// Certification link storage (spec §6). `current_valid_links` already
/// excludes obsolete links as of the caller's notion of "now".
pub trait LinkStore: Send + Sync {
    fn current_valid_links(&self, as_of: i64, sig_validity: i64) -> Result<Vec<CertLink>>;
    fn obsoletes(&self, as_of: i64, sig_validity: i64) -> Result<Vec<CertLink>>;
    fn is_over_3_steps_of_a_member(&self, fingerprint: &str) -> Result<bool>;
    fn is_still_over_3_steps(&self, fingerprint: &str, extra_links: &[CertLink]) -> Result<bool>;
    fn save(&self, link: CertLink) -> Result<()>;
}

/// The authoritative OpenPGP material on file for each member (spec §6).
pub trait TrustedKeyStore: Send + Sync {
    fn get_the_one(&self, fingerprint: &str) -> Result<Option<TrustedKey>>;
    fn save(&self, key: TrustedKey) -> Result<()>;
}

/// Pending membership declarations (spec §6), the durable counterpart of
/// [`crate::membership::MembershipPool`].
pub trait MembershipPoolStore: Send + Sync {
    fn find(&self) -> Result<Vec<Membership>>;
    fn remove_for(&self, issuer: &str, hash: &str) -> Result<()>;
    fn get_for_hash_and_issuer(&self, issuer: &str, hash: &str) -> Result<Option<Membership>>;
    fn insert(&self, membership: Membership) -> Result<()>;
}
