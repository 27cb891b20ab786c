use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use super::keychange::Keychange;

/// A signed member-set change, `"+FPR"` or `"-FPR"` (spec §3
/// `membersChanges`). Kept as a thin newtype instead of a bare `String` so
/// the sort/parse invariants (spec §4.4 step 8, §9 "Ordering sensitivity")
/// have one place to live.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberChange(pub String);

impl MemberChange {
    pub fn joining(fpr: &str) -> Self {
        MemberChange(format!("+{fpr}"))
    }

    pub fn leaving(fpr: &str) -> Self {
        MemberChange(format!("-{fpr}"))
    }

    pub fn is_join(&self) -> bool {
        self.0.starts_with('+')
    }

    pub fn is_leave(&self) -> bool {
        self.0.starts_with('-')
    }

    pub fn fingerprint(&self) -> &str {
        &self.0[1..]
    }
}

/// The unit of consensus (spec §3 "Keyblock").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyblock {
    pub number: u64,
    pub currency: String,
    /// Empty iff `number == 0`.
    pub previous_hash: String,
    /// Empty iff `number == 0`.
    pub previous_issuer: String,
    pub timestamp: i64,
    pub nonce: u64,
    pub issuer: String,
    pub members_root: String,
    pub members_count: u64,
    /// Lexicographically sorted (spec §3, §9).
    pub members_changes: Vec<MemberChange>,
    pub keys_changes: Vec<Keychange>,
    pub signature: Vec<u8>,
    pub hash: String,
}

impl Keyblock {
    /// Canonical field-ordered text that gets hashed together with the
    /// signature to produce `hash`. Exact byte layout is explicitly out of
    /// scope (spec §6); this only needs to be stable and self-consistent.
    pub fn raw(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Number: {}\n", self.number));
        out.push_str(&format!("Currency: {}\n", self.currency));
        out.push_str(&format!("PreviousHash: {}\n", self.previous_hash));
        out.push_str(&format!("PreviousIssuer: {}\n", self.previous_issuer));
        out.push_str(&format!("Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("Nonce: {}\n", self.nonce));
        out.push_str(&format!("Issuer: {}\n", self.issuer));
        out.push_str(&format!("MembersRoot: {}\n", self.members_root));
        out.push_str(&format!("MembersCount: {}\n", self.members_count));
        out.push_str("MembersChanges:\n");
        for change in &self.members_changes {
            out.push_str(&change.0);
            out.push('\n');
        }
        out.push_str(&format!("KeysChangesCount: {}\n", self.keys_changes.len()));
        out
    }

    /// `hash(raw() ++ signature)`, hex-encoded lowercase (spec §3, §6).
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.raw().as_bytes());
        hasher.update(&self.signature);
        hex::encode(hasher.finalize())
    }

    /// Number of leading zero hex digits in `hash` (spec §3 invariant 7,
    /// §4.4 step 3).
    pub fn leading_zero_hex_digits(hash: &str) -> u32 {
        hash.chars().take_while(|c| *c == '0').count() as u32
    }
}
