use serde::{Deserialize, Serialize};

/// A directed certification from `source` to `target` (spec §3
/// "Certification link"). Valid for `sig_validity` seconds from
/// `timestamp`; obsolete links are kept for history but excluded from
/// every reachability and link-count computation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CertLink {
    pub source: String,
    pub target: String,
    pub timestamp: i64,
}

impl CertLink {
    pub fn is_obsolete(&self, as_of: i64, sig_validity: i64) -> bool {
        as_of - self.timestamp >= sig_validity
    }
}
