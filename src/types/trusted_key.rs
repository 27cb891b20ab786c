use serde::{Deserialize, Serialize};

/// Authoritative OpenPGP material for a member (spec §3 "Trusted key").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedKey {
    pub fingerprint: String,
    pub uid: String,
    /// The packet subset `KeyOracle::decompose` extracted: primary key,
    /// userid, self-certification, third-party certifications, subkeys,
    /// subkey bindings, splice-ordered per spec §4.5 step 4.
    pub packets: Vec<u8>,
}

impl TrustedKey {
    /// Last 16 hex chars of the fingerprint (spec GLOSSARY).
    pub fn key_id(&self) -> &str {
        let fpr = &self.fingerprint;
        if fpr.len() >= 16 {
            &fpr[fpr.len() - 16..]
        } else {
            fpr
        }
    }
}

/// Per-fingerprint derived flags (spec §3 "Key row").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyRow {
    pub member: bool,
    pub kick: bool,
    pub distanced: Vec<String>,
}
