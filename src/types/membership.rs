use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipKind {
    In,
    Out,
}

/// A signed declaration of intent to join or leave the Web of Trust
/// (spec §3 "Membership").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub issuer: String,
    pub userid: String,
    pub membership: MembershipKind,
    pub date: i64,
    pub hash: String,
    pub signature: Vec<u8>,
    /// Candidate for inclusion in the next block.
    pub eligible: bool,
    /// Already materialized into an applied block.
    pub propagated: bool,
}

impl Membership {
    /// Identity used for idempotent pool inserts (spec §3 "Lifecycle",
    /// §6 `getForHashAndIssuer`).
    pub fn identity(&self) -> (String, String) {
        (self.issuer.clone(), self.hash.clone())
    }
}
