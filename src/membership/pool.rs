use std::collections::BTreeMap;

use crate::types::{Membership, MembershipKind};

/// Pending, signature-verified JOIN/LEAVE declarations waiting to be
/// picked up into a block (spec §2 C3, §3 "Membership lifecycle").
///
/// Keyed by `(issuer, hash)` so re-submitting the same signed declaration
/// is a no-op rather than a duplicate entry (spec §6 `getForHashAndIssuer`).
#[derive(Debug, Clone, Default)]
pub struct MembershipPool {
    entries: BTreeMap<(String, String), Membership>,
}

impl MembershipPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a membership, superseding any other pending entry from the
    /// same issuer (only one declaration per member is meaningful at a
    /// time). Returns the entries it displaced.
    pub fn insert(&mut self, membership: Membership) -> Vec<Membership> {
        let displaced = self.supersede(&membership.issuer);
        self.entries
            .insert(membership.identity(), membership);
        displaced
    }

    /// Remove every pending entry for `issuer` other than the one that
    /// would collide on `(issuer, hash)` — used both by `insert` and
    /// directly once a block applies a member's keychange.
    pub fn supersede(&mut self, issuer: &str) -> Vec<Membership> {
        let keys: Vec<(String, String)> = self
            .entries
            .keys()
            .filter(|(i, _)| i == issuer)
            .cloned()
            .collect();
        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .collect()
    }

    pub fn get_for_hash_and_issuer(&self, issuer: &str, hash: &str) -> Option<&Membership> {
        self.entries.get(&(issuer.to_string(), hash.to_string()))
    }

    /// Remove and return one entry by identity (spec §6 `removeForHash`),
    /// used once a membership has been picked into a built block.
    pub fn remove(&mut self, issuer: &str, hash: &str) -> Option<Membership> {
        self.entries.remove(&(issuer.to_string(), hash.to_string()))
    }

    /// Drop entries older than `ttl` seconds as of `as_of` (spec §3
    /// "Lifecycle": expired declarations are silently dropped, not kept
    /// around for the next block).
    pub fn expire(&mut self, as_of: i64, ttl: i64) -> Vec<Membership> {
        let expired_keys: Vec<(String, String)> = self
            .entries
            .iter()
            .filter(|(_, m)| as_of - m.date >= ttl)
            .map(|(k, _)| k.clone())
            .collect();
        expired_keys
            .into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .collect()
    }

    /// Entries marked eligible for inclusion in the next block, in a
    /// deterministic (issuer, hash) order.
    pub fn eligible(&self) -> Vec<&Membership> {
        self.entries.values().filter(|m| m.eligible).collect()
    }

    pub fn eligible_joins(&self) -> Vec<&Membership> {
        self.eligible()
            .into_iter()
            .filter(|m| m.membership == MembershipKind::In)
            .collect()
    }

    pub fn eligible_leaves(&self) -> Vec<&Membership> {
        self.eligible()
            .into_iter()
            .filter(|m| m.membership == MembershipKind::Out)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(issuer: &str, hash: &str, date: i64, eligible: bool) -> Membership {
        Membership {
            issuer: issuer.to_string(),
            userid: "alice (Paris)".to_string(),
            membership: MembershipKind::In,
            date,
            hash: hash.to_string(),
            signature: vec![],
            eligible,
            propagated: false,
        }
    }

    #[test]
    fn inserting_same_identity_twice_is_idempotent() {
        let mut pool = MembershipPool::new();
        pool.insert(membership("alice", "h1", 0, true));
        let displaced = pool.insert(membership("alice", "h1", 0, true));
        assert!(displaced.is_empty());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn new_declaration_supersedes_older_one_from_same_issuer() {
        let mut pool = MembershipPool::new();
        pool.insert(membership("alice", "h1", 0, true));
        let displaced = pool.insert(membership("alice", "h2", 10, true));
        assert_eq!(displaced.len(), 1);
        assert_eq!(displaced[0].hash, "h1");
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn expire_drops_entries_past_ttl() {
        let mut pool = MembershipPool::new();
        pool.insert(membership("alice", "h1", 0, true));
        let expired = pool.expire(1000, 500);
        assert_eq!(expired.len(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn eligible_filters_on_flag() {
        let mut pool = MembershipPool::new();
        pool.insert(membership("alice", "h1", 0, true));
        pool.insert(membership("bob", "h2", 0, false));
        assert_eq!(pool.eligible().len(), 1);
    }
}
