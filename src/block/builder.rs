use std::collections::BTreeSet;

use crate::crypto::KeyOracle;
use crate::keychange::{KeychangeValidator, TrustedKeyLookup};
use crate::storage::{BlockStore, LinkStore, MemberIndex, TrustedKeyStore};
use crate::types::{Keyblock, Keychange, MemberChange, Membership, Result};
use crate::wot::{members_root, ExtraLinks, WotGraph};
use crate::config::NodeConfig;

/// Narrows a pool of eligible join declarations down to the ones a
/// candidate block should actually try to admit (spec §9 Open Question:
/// modeled as a pluggable predicate rather than a fixed policy). The
/// default, [`identity_filter`], admits every eligible candidate.
pub type NewcomerFilter = Box<dyn Fn(&[Membership]) -> Vec<Membership> + Send + Sync>;

pub fn identity_filter() -> NewcomerFilter {
    Box::new(|memberships: &[Membership]| memberships.to_vec())
}

struct KeyLookupAdapter<'a> {
    keys: &'a dyn TrustedKeyStore,
    members: &'a dyn MemberIndex,
}

impl<'a> TrustedKeyLookup for KeyLookupAdapter<'a> {
    fn key_for(&self, fpr_or_key_id: &str) -> Option<crate::types::TrustedKey> {
        self.keys.get_the_one(fpr_or_key_id).ok().flatten()
    }

    fn is_member(&self, fingerprint: &str) -> bool {
        self.members.is_member(fingerprint).unwrap_or(false)
    }
}

/// Assembles unsigned, unmined candidate blocks (spec §2 C8, §4.8).
/// Signing and proof-of-work happen afterwards — this only decides what
/// goes into the block.
pub struct BlockBuilder<'a, O: KeyOracle> {
    blocks: &'a dyn BlockStore,
    members: &'a dyn MemberIndex,
    links: &'a dyn LinkStore,
    keys: &'a dyn TrustedKeyStore,
    oracle: &'a O,
    config: &'a NodeConfig,
}

impl<'a, O: KeyOracle> BlockBuilder<'a, O> {
    pub fn new(
        blocks: &'a dyn BlockStore,
        members: &'a dyn MemberIndex,
        links: &'a dyn LinkStore,
        keys: &'a dyn TrustedKeyStore,
        oracle: &'a O,
        config: &'a NodeConfig,
    ) -> Self {
        Self {
            blocks,
            members,
            links,
            keys,
            oracle,
            config,
        }
    }

    fn skeleton(&self, issuer: &str, timestamp: i64) -> Result<Keyblock> {
        let tip = self.blocks.current()?;
        let (number, previous_hash, previous_issuer) = match &tip {
            Some(tip) => (tip.number + 1, tip.hash.clone(), tip.issuer.clone()),
            None => (0, String::new(), String::new()),
        };
        Ok(Keyblock {
            number,
            currency: self.config.currency.clone(),
            previous_hash,
            previous_issuer,
            timestamp,
            nonce: 0,
            issuer: issuer.to_string(),
            members_root: String::new(),
            members_count: 0,
            members_changes: Vec::new(),
            keys_changes: Vec::new(),
            signature: Vec::new(),
            hash: String::new(),
        })
    }

    fn finalize_member_fields(&self, block: &mut Keyblock) -> Result<()> {
        let current_members: BTreeSet<String> = self.members.get_members()?.into_iter().collect();
        let leaving: BTreeSet<&str> = block
            .members_changes
            .iter()
            .filter(|c| c.is_leave())
            .map(|c| c.fingerprint())
            .collect();
        let joining: BTreeSet<&str> = block
            .members_changes
            .iter()
            .filter(|c| c.is_join())
            .map(|c| c.fingerprint())
            .collect();

        let next_members: Vec<String> = current_members
            .iter()
            .filter(|m| !leaving.contains(m.as_str()))
            .cloned()
            .chain(joining.into_iter().map(str::to_string))
            .collect();

        block.members_root = members_root(&next_members);
        block.members_count = next_members.len() as u64;
        block.members_changes.sort();
        Ok(())
    }

    /// A block with no `keysChanges`, only the member-set consequences of
    /// the current kick state (spec boundary case: kick-only block).
    pub fn build_updates_only(&self, issuer: &str, timestamp: i64) -> Result<Keyblock> {
        let mut block = self.skeleton(issuer, timestamp)?;
        for fingerprint in self.members.get_to_be_kicked()? {
            block.members_changes.push(MemberChange::leaving(&fingerprint));
        }
        self.finalize_member_fields(&mut block)?;
        Ok(block)
    }

    /// Admits newcomers one at a time, re-checking WoT stability after
    /// each acceptance so later candidates see the links earlier ones in
    /// this same block already established (spec §4.8 "iterated
    /// admission").
    pub fn build_with_newcomers(
        &self,
        issuer: &str,
        timestamp: i64,
        candidates: &[(Membership, Keychange)],
        filter: &NewcomerFilter,
    ) -> Result<Keyblock> {
        let memberships: Vec<Membership> = candidates.iter().map(|(m, _)| m.clone()).collect();
        let selected = filter(&memberships);
        let selected_hashes: BTreeSet<(String, String)> =
            selected.iter().map(Membership::identity).collect();

        let mut block = self.skeleton(issuer, timestamp)?;
        let validator = KeychangeValidator::new(self.oracle);
        let lookup = KeyLookupAdapter {
            keys: self.keys,
            members: self.members,
        };

        let mut members: BTreeSet<String> = self.members.get_members()?.into_iter().collect();
        let stored_links = self
            .links
            .current_valid_links(timestamp, self.config.sig_validity)?;
        let mut graph = WotGraph::new(members.clone(), &stored_links);
        let mut extra_links = ExtraLinks::new();

        for (membership, keychange) in candidates {
            if !selected_hashes.contains(&membership.identity()) {
                continue;
            }
            let fingerprint = keychange.fingerprint().to_string();

            let validated = match validator.validate(keychange, timestamp, &lookup) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if validated.certifiers.len() < self.config.sig_qty {
                continue;
            }

            let mut candidate_links = extra_links.clone();
            for link in &validated.new_links {
                candidate_links
                    .entry(link.target.clone())
                    .or_default()
                    .insert(link.source.clone());
            }
            let mutually_reachable_with_everyone = members.iter().all(|other| {
                other == &fingerprint
                    || graph.mutually_reachable(&fingerprint, other, self.config.max_hops, &candidate_links)
            });
            if !mutually_reachable_with_everyone {
                continue;
            }

            extra_links = candidate_links;
            members.insert(fingerprint.clone());
            graph = WotGraph::new(members.clone(), &stored_links);

            block.members_changes.push(MemberChange::joining(&fingerprint));
            block.keys_changes.push(keychange.clone());
        }

        for fingerprint in self.members.get_to_be_kicked()? {
            block.members_changes.push(MemberChange::leaving(&fingerprint));
        }

        self.finalize_member_fields(&mut block)?;
        Ok(block)
    }
}
