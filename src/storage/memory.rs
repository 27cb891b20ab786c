use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use crate::types::{CertLink, Keyblock, Membership, Result, StorageError, TrustedKey};

use super::traits::{BlockStore, LinkStore, MemberIndex, MembershipPoolStore, TrustedKeyStore};

/// In-process reference implementation of the §6 storage traits, mirroring
/// the shape of a simple mutex-guarded in-memory backend: every method
/// takes and releases a short-lived lock, with no cross-method atomicity
/// guarantees beyond what each individual call needs.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: Mutex<Vec<Keyblock>>,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockStore for MemoryBlockStore {
    fn current(&self) -> Result<Option<Keyblock>> {
        let blocks = self.blocks.lock().unwrap();
        Ok(blocks.last().cloned())
    }

    fn find_by_number(&self, number: u64) -> Result<Option<Keyblock>> {
        let blocks = self.blocks.lock().unwrap();
        Ok(blocks.iter().find(|b| b.number == number).cloned())
    }

    fn last_of_issuer(&self, issuer: &str) -> Result<Option<Keyblock>> {
        let blocks = self.blocks.lock().unwrap();
        Ok(blocks.iter().rev().find(|b| b.issuer == issuer).cloned())
    }

    fn save(&self, block: Keyblock) -> Result<()> {
        let mut blocks = self.blocks.lock().unwrap();
        if let Some(tip) = blocks.last() {
            if block.number != tip.number + 1 {
                return Err(StorageError::Backend(format!(
                    "cannot save block {} on top of tip {}",
                    block.number, tip.number
                ))
                .into());
            }
        } else if block.number != 0 {
            return Err(StorageError::Backend(
                "first saved block must be the genesis".to_string(),
            )
            .into());
        }
        blocks.push(block);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryMemberIndex {
    members: Mutex<BTreeSet<String>>,
    kicked: Mutex<BTreeMap<String, Vec<String>>>,
}

impl MemoryMemberIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemberIndex for MemoryMemberIndex {
    fn is_member(&self, fingerprint: &str) -> Result<bool> {
        Ok(self.members.lock().unwrap().contains(fingerprint))
    }

    fn get_members(&self) -> Result<Vec<String>> {
        Ok(self.members.lock().unwrap().iter().cloned().collect())
    }

    fn add_member(&self, fingerprint: &str) -> Result<()> {
        self.members.lock().unwrap().insert(fingerprint.to_string());
        Ok(())
    }

    fn remove_member(&self, fingerprint: &str) -> Result<()> {
        self.members.lock().unwrap().remove(fingerprint);
        self.kicked.lock().unwrap().remove(fingerprint);
        Ok(())
    }

    fn set_kicked(&self, fingerprint: &str, distanced: Vec<String>) -> Result<()> {
        self.kicked
            .lock()
            .unwrap()
            .insert(fingerprint.to_string(), distanced);
        Ok(())
    }

    fn unset_kicked(&self, fingerprint: &str) -> Result<()> {
        self.kicked.lock().unwrap().remove(fingerprint);
        Ok(())
    }

    fn get_to_be_kicked(&self) -> Result<Vec<String>> {
        Ok(self.kicked.lock().unwrap().keys().cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryLinkStore {
    links: Mutex<Vec<CertLink>>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LinkStore for MemoryLinkStore {
    fn current_valid_links(&self, as_of: i64, sig_validity: i64) -> Result<Vec<CertLink>> {
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| !l.is_obsolete(as_of, sig_validity))
            .cloned()
            .collect())
    }

    fn obsoletes(&self, as_of: i64, sig_validity: i64) -> Result<Vec<CertLink>> {
        Ok(self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.is_obsolete(as_of, sig_validity))
            .cloned()
            .collect())
    }

    fn is_over_3_steps_of_a_member(&self, fingerprint: &str) -> Result<bool> {
        let links = self.links.lock().unwrap();
        Ok(!links.iter().any(|l| l.target == fingerprint))
    }

    fn is_still_over_3_steps(&self, fingerprint: &str, extra_links: &[CertLink]) -> Result<bool> {
        let links = self.links.lock().unwrap();
        let has_existing = links.iter().any(|l| l.target == fingerprint);
        let has_extra = extra_links.iter().any(|l| l.target == fingerprint);
        Ok(!has_existing && !has_extra)
    }

    fn save(&self, link: CertLink) -> Result<()> {
        self.links.lock().unwrap().push(link);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTrustedKeyStore {
    by_fingerprint: Mutex<BTreeMap<String, TrustedKey>>,
    by_key_id: Mutex<BTreeMap<String, String>>,
}

impl MemoryTrustedKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrustedKeyStore for MemoryTrustedKeyStore {
    /// Resolves by full fingerprint or by the 16-hex keyID carried on
    /// signatures (spec §6 `getTheOne(fprOrKeyId)`).
    fn get_the_one(&self, fpr_or_key_id: &str) -> Result<Option<TrustedKey>> {
        let by_fingerprint = self.by_fingerprint.lock().unwrap();
        if let Some(key) = by_fingerprint.get(fpr_or_key_id) {
            return Ok(Some(key.clone()));
        }
        let by_key_id = self.by_key_id.lock().unwrap();
        Ok(by_key_id
            .get(fpr_or_key_id)
            .and_then(|fpr| by_fingerprint.get(fpr))
            .cloned())
    }

    fn save(&self, key: TrustedKey) -> Result<()> {
        self.by_key_id
            .lock()
            .unwrap()
            .insert(key.key_id().to_string(), key.fingerprint.clone());
        self.by_fingerprint
            .lock()
            .unwrap()
            .insert(key.fingerprint.clone(), key);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryMembershipPoolStore {
    pending: Mutex<BTreeMap<(String, String), Membership>>,
}

impl MemoryMembershipPoolStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MembershipPoolStore for MemoryMembershipPoolStore {
    fn find(&self) -> Result<Vec<Membership>> {
        Ok(self.pending.lock().unwrap().values().cloned().collect())
    }

    fn remove_for(&self, issuer: &str, hash: &str) -> Result<()> {
        self.pending
            .lock()
            .unwrap()
            .remove(&(issuer.to_string(), hash.to_string()));
        Ok(())
    }

    fn get_for_hash_and_issuer(&self, issuer: &str, hash: &str) -> Result<Option<Membership>> {
        Ok(self
            .pending
            .lock()
            .unwrap()
            .get(&(issuer.to_string(), hash.to_string()))
            .cloned())
    }

    fn insert(&self, membership: Membership) -> Result<()> {
        self.pending
            .lock()
            .unwrap()
            .insert(membership.identity(), membership);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MembershipKind;

    fn block(number: u64) -> Keyblock {
        Keyblock {
            number,
            currency: "test".to_string(),
            previous_hash: String::new(),
            previous_issuer: String::new(),
            timestamp: 0,
            nonce: 0,
            issuer: "issuer".to_string(),
            members_root: String::new(),
            members_count: 0,
            members_changes: vec![],
            keys_changes: vec![],
            signature: vec![],
            hash: String::new(),
        }
    }

    #[test]
    fn block_store_rejects_non_genesis_first_save() {
        let store = MemoryBlockStore::new();
        assert!(store.save(block(1)).is_err());
    }

    #[test]
    fn block_store_rejects_out_of_order_save() {
        let store = MemoryBlockStore::new();
        store.save(block(0)).unwrap();
        assert!(store.save(block(2)).is_err());
        store.save(block(1)).unwrap();
        assert_eq!(store.current().unwrap().unwrap().number, 1);
    }

    #[test]
    fn member_index_round_trips_kick_state() {
        let index = MemoryMemberIndex::new();
        index.add_member("abc").unwrap();
        index.set_kicked("abc", vec!["def".to_string()]).unwrap();
        assert_eq!(index.get_to_be_kicked().unwrap(), vec!["abc".to_string()]);
        index.unset_kicked("abc").unwrap();
        assert!(index.get_to_be_kicked().unwrap().is_empty());
    }

    #[test]
    fn membership_pool_store_is_keyed_by_issuer_and_hash() {
        let store = MemoryMembershipPoolStore::new();
        store
            .insert(Membership {
                issuer: "alice".to_string(),
                userid: "alice (x)".to_string(),
                membership: MembershipKind::In,
                date: 0,
                hash: "h1".to_string(),
                signature: vec![],
                eligible: true,
                propagated: false,
            })
            .unwrap();
        assert!(store.get_for_hash_and_issuer("alice", "h1").unwrap().is_some());
        store.remove_for("alice", "h1").unwrap();
        assert!(store.get_for_hash_and_issuer("alice", "h1").unwrap().is_none());
    }
}
