use std::collections::{BTreeMap, BTreeSet};

use tracing::instrument;

use crate::crypto::KeyOracle;
use crate::keychange::{KeychangeValidator, TrustedKeyLookup};
use crate::pow::expected_zeros;
use crate::types::{
    CertLink, ChainingError, Keyblock, KeyRow, Keychange, Result, TrustedKey, ValidationError,
};
use crate::wot::{members_root, recompute_kicks, ExtraLinks, WotGraph};
use crate::{config::NodeConfig, storage::BlockStore, storage::LinkStore, storage::MemberIndex, storage::TrustedKeyStore};

/// Artifacts produced by a successful validation pass, consumed by
/// [`super::applier::BlockApplier`] so it never has to recompute them
/// against a graph that may have moved on.
#[derive(Debug, Clone, Default)]
pub struct BlockValidation {
    pub new_links: Vec<CertLink>,
    pub kick_rows: BTreeMap<String, KeyRow>,
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

/// Resolves certifiers against the durable trusted-key store first, then
/// against the other NEWCOMER keys declared in this same block (spec
/// §4.3 step 4 "(a) an entry in `newKeys` (co-newcomer)"). Both stores
/// resolve by full fingerprint or by the 16-hex keyID carried on a
/// signature's issuer field (spec §6 `getTheOne(fprOrKeyId)`).
struct CompositeLookup<'a> {
    primary: KeyLookupAdapter<'a>,
    co_newcomers: &'a BTreeMap<String, TrustedKey>,
    co_newcomers_by_key_id: &'a BTreeMap<String, String>,
}

impl<'a> TrustedKeyLookup for CompositeLookup<'a> {
    fn key_for(&self, fpr_or_key_id: &str) -> Option<TrustedKey> {
        if let Some(key) = self.co_newcomers.get(fpr_or_key_id) {
            return Some(key.clone());
        }
        if let Some(key) = self
            .co_newcomers_by_key_id
            .get(fpr_or_key_id)
            .and_then(|fpr| self.co_newcomers.get(fpr))
        {
            return Some(key.clone());
        }
        self.primary.key_for(fpr_or_key_id)
    }

    fn is_member(&self, fingerprint: &str) -> bool {
        self.co_newcomers.contains_key(fingerprint) || self.primary.is_member(fingerprint)
    }
}

/// Runs a candidate block through the full acceptance pipeline (spec §2
/// C5, §4.4): chain linkage, clock window, proof of work, issuer
/// eligibility, keychange validation, WoT stability, kicked-set
/// correctness, and `membersChanges` coherence. Every step returns on the
/// first failure — no partial state is ever exposed.
pub struct BlockValidator<'a, O: KeyOracle> {
    blocks: &'a dyn BlockStore,
    members: &'a dyn MemberIndex,
    links: &'a dyn LinkStore,
    keys: &'a dyn TrustedKeyStore,
    oracle: &'a O,
    config: &'a NodeConfig,
}

impl<'a, O: KeyOracle> BlockValidator<'a, O> {
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

    #[instrument(skip(self, candidate), fields(number = candidate.number, issuer = %candidate.issuer))]
    pub fn validate(&self, candidate: &Keyblock, now: i64) -> Result<BlockValidation> {
        let tip = self.blocks.current()?;

        self.check_chaining(candidate, tip.as_ref())?;
        self.check_timestamp(candidate, now)?;
        self.check_pow(candidate, tip.as_ref())?;
        self.check_issuer_eligibility(candidate, tip.is_some())?;
        self.check_members_root(candidate)?;

        let (new_links, newcomers) = self.check_keychanges(candidate)?;
        let kick_rows = self.check_wot_stability(candidate, &newcomers, &new_links)?;
        self.check_kicked_set(candidate, &kick_rows)?;
        self.check_members_changes_coherence(candidate, &newcomers)?;

        Ok(BlockValidation {
            new_links,
            kick_rows,
        })
    }

    fn check_chaining(&self, candidate: &Keyblock, tip: Option<&Keyblock>) -> Result<()> {
        match tip {
            None => {
                if candidate.number != 0 {
                    return Err(ChainingError::RequiresRoot.into());
                }
            }
            Some(tip) => {
                if candidate.number <= tip.number {
                    return Err(ChainingError::TooLate {
                        got: candidate.number,
                        tip: tip.number,
                    }
                    .into());
                }
                if candidate.number > tip.number + 1 {
                    return Err(ChainingError::TooEarly {
                        got: candidate.number,
                        expected: tip.number + 1,
                    }
                    .into());
                }
                if candidate.previous_hash != tip.hash {
                    return Err(ChainingError::BadPrevHash {
                        got: candidate.previous_hash.clone(),
                        expected: tip.hash.clone(),
                    }
                    .into());
                }
                if candidate.previous_issuer != tip.issuer {
                    return Err(ChainingError::BadPrevIssuer {
                        got: candidate.previous_issuer.clone(),
                        expected: tip.issuer.clone(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn check_timestamp(&self, candidate: &Keyblock, now: i64) -> Result<()> {
        if (candidate.timestamp - now).abs() > self.config.ts_interval {
            return Err(ValidationError::BadTimestamp {
                block_ts: candidate.timestamp,
                now,
                ts_interval: self.config.ts_interval,
            });
        }
        Ok(())
    }

    fn required_zeros(&self, candidate: &Keyblock) -> Result<u32> {
        let last = self
            .blocks
            .last_of_issuer(&candidate.issuer)?
            .map(|b| (b.number, b.hash));
        let current_members_count = self.members.get_members()?.len();
        Ok(expected_zeros(
            self.config.pow_zero_min,
            self.config.pow_period,
            self.config.pow_period_c,
            current_members_count,
            candidate.number,
            last.as_ref().map(|(n, h)| (*n, h.as_str())),
        ))
    }

    fn check_pow(&self, candidate: &Keyblock, tip: Option<&Keyblock>) -> Result<()> {
        // Genesis has no prior issuer history to penalize against.
        let required = if tip.is_some() {
            self.required_zeros(candidate)?
        } else {
            self.config.pow_zero_min
        };
        let actual = Keyblock::leading_zero_hex_digits(&candidate.hash);
        if actual < required {
            return Err(ValidationError::BadPoW { actual, required });
        }
        if candidate.compute_hash() != candidate.hash {
            return Err(ValidationError::BadCrypto(
                "block hash does not match its own content".to_string(),
            ));
        }
        Ok(())
    }

    fn check_issuer_eligibility(&self, candidate: &Keyblock, has_tip: bool) -> Result<()> {
        if has_tip {
            if !self.members.is_member(&candidate.issuer)? {
                return Err(ValidationError::BadIssuer(candidate.issuer.clone()));
            }
        } else {
            let issues_own_newcomer = candidate.keys_changes.iter().any(|kc| {
                matches!(kc, Keychange::Newcomer(n) if n.fingerprint == candidate.issuer)
            });
            if !issues_own_newcomer {
                return Err(ValidationError::BadIssuer(candidate.issuer.clone()));
            }
        }
        Ok(())
    }

    fn check_members_root(&self, candidate: &Keyblock) -> Result<()> {
        let current_members = self.members.get_members()?;
        let joining: Vec<&str> = candidate
            .members_changes
            .iter()
            .filter(|c| c.is_join())
            .map(|c| c.fingerprint())
            .collect();
        let leaving: BTreeSet<&str> = candidate
            .members_changes
            .iter()
            .filter(|c| c.is_leave())
            .map(|c| c.fingerprint())
            .collect();

        let next_members: Vec<String> = current_members
            .iter()
            .filter(|m| !leaving.contains(m.as_str()))
            .cloned()
            .chain(joining.into_iter().map(str::to_string))
            .collect();

        let expected_root = members_root(&next_members);
        if candidate.members_root != expected_root {
            return Err(ValidationError::BadMembersChanges(format!(
                "membersRoot {} does not match the expected {expected_root}",
                candidate.members_root
            )));
        }
        if candidate.members_count != next_members.len() as u64 {
            return Err(ValidationError::BadMembersChanges(format!(
                "membersCount {} does not match the expected {}",
                candidate.members_count,
                next_members.len()
            )));
        }
        Ok(())
    }

    fn check_keychanges(
        &self,
        candidate: &Keyblock,
    ) -> Result<(Vec<CertLink>, BTreeMap<String, Vec<String>>)> {
        let validator = KeychangeValidator::new(self.oracle);

        // Pre-pass so certifications from one newcomer onto another, both
        // declared in this same block, resolve (spec §4.3 step 4 "(a) an
        // entry in newKeys").
        let mut co_newcomers = BTreeMap::new();
        let mut co_newcomers_by_key_id = BTreeMap::new();
        for keychange in &candidate.keys_changes {
            if let Keychange::Newcomer(n) = keychange {
                if let Ok(decomposed) = self.oracle.decompose(&n.keypackets) {
                    let key = TrustedKey {
                        fingerprint: decomposed.fingerprint.clone(),
                        uid: decomposed.user_id,
                        packets: n.keypackets.clone(),
                    };
                    co_newcomers_by_key_id.insert(key.key_id().to_string(), key.fingerprint.clone());
                    co_newcomers.insert(decomposed.fingerprint, key);
                }
            }
        }
        let lookup = CompositeLookup {
            primary: KeyLookupAdapter {
                keys: self.keys,
                members: self.members,
            },
            co_newcomers: &co_newcomers,
            co_newcomers_by_key_id: &co_newcomers_by_key_id,
        };

        let mut new_links = Vec::new();
        let mut newcomers = BTreeMap::new();
        let mut seen = BTreeSet::new();

        for keychange in &candidate.keys_changes {
            if !seen.insert(keychange.fingerprint().to_string()) {
                return Err(ValidationError::BadKeychange {
                    fingerprint: keychange.fingerprint().to_string(),
                    reason: "fingerprint appears more than once in this block".to_string(),
                });
            }

            let validated = validator.validate(keychange, candidate.timestamp, &lookup)?;

            if let Keychange::Newcomer(n) = keychange {
                if validated.certifiers.len() < self.config.sig_qty {
                    return Err(ValidationError::BadKeychange {
                        fingerprint: n.fingerprint.clone(),
                        reason: format!(
                            "only {} certifiers, needs {}",
                            validated.certifiers.len(),
                            self.config.sig_qty
                        ),
                    });
                }
                newcomers.insert(n.fingerprint.clone(), validated.certifiers.clone());
            }

            new_links.extend(validated.new_links);
        }

        Ok((new_links, newcomers))
    }

    fn check_wot_stability(
        &self,
        candidate: &Keyblock,
        newcomers: &BTreeMap<String, Vec<String>>,
        new_links: &[CertLink],
    ) -> Result<BTreeMap<String, KeyRow>> {
        let mut members: BTreeSet<String> = self.members.get_members()?.into_iter().collect();
        members.extend(newcomers.keys().cloned());

        let stored_links = self
            .links
            .current_valid_links(candidate.timestamp, self.config.sig_validity)?;
        let graph = WotGraph::new(members.clone(), &stored_links);

        let mut extra_links = ExtraLinks::new();
        for link in new_links {
            extra_links
                .entry(link.target.clone())
                .or_default()
                .insert(link.source.clone());
        }

        for fingerprint in newcomers.keys() {
            if candidate.number > 0 && graph.link_count(fingerprint, &extra_links) < self.config.sig_qty {
                return Err(ValidationError::WoTUnstable(format!(
                    "{fingerprint} has fewer than {} valid links after this block",
                    self.config.sig_qty
                )));
            }
            let unreachable_from_someone = members.iter().any(|other| {
                other != fingerprint
                    && !graph.mutually_reachable(fingerprint, other, self.config.max_hops, &extra_links)
            });
            if unreachable_from_someone {
                return Err(ValidationError::WoTUnstable(format!(
                    "{fingerprint} is not mutually reachable with every member within {} hops",
                    self.config.max_hops
                )));
            }
        }

        Ok(recompute_kicks(
            &graph,
            self.config.max_hops,
            self.config.sig_qty,
            &extra_links,
        ))
    }

    fn check_kicked_set(
        &self,
        candidate: &Keyblock,
        kick_rows: &BTreeMap<String, KeyRow>,
    ) -> Result<()> {
        let current_members: BTreeSet<String> =
            self.members.get_members()?.into_iter().collect();
        let declared_kicks: BTreeSet<&str> = candidate
            .members_changes
            .iter()
            .filter(|c| c.is_leave())
            .map(|c| c.fingerprint())
            .collect();

        for fingerprint in &declared_kicks {
            if !current_members.contains(*fingerprint) {
                return Err(ValidationError::BadKickSet(format!(
                    "{fingerprint} is declared leaving but is not a current member"
                )));
            }
        }

        let computed_kicks: BTreeSet<&str> = kick_rows
            .iter()
            .filter(|(_, row)| row.kick)
            .map(|(fpr, _)| fpr.as_str())
            .collect();

        let missing: Vec<&str> = computed_kicks.difference(&declared_kicks).copied().collect();
        if !missing.is_empty() {
            return Err(ValidationError::BadKickSet(format!(
                "members distanced beyond the WoT are missing from membersChanges: {missing:?}"
            )));
        }

        let unjustified: Vec<&str> = declared_kicks.difference(&computed_kicks).copied().collect();
        if !unjustified.is_empty() {
            return Err(ValidationError::BadKickSet(format!(
                "membersChanges declares -FPR for members who are no longer failing: {unjustified:?}"
            )));
        }

        Ok(())
    }

    fn check_members_changes_coherence(
        &self,
        candidate: &Keyblock,
        newcomers: &BTreeMap<String, Vec<String>>,
    ) -> Result<()> {
        let mut sorted = candidate.members_changes.clone();
        sorted.sort();
        if sorted != candidate.members_changes {
            return Err(ValidationError::BadMembersChanges(
                "membersChanges is not lexicographically sorted".to_string(),
            ));
        }

        let joins: BTreeSet<&str> = candidate
            .members_changes
            .iter()
            .filter(|c| c.is_join())
            .map(|c| c.fingerprint())
            .collect();
        let newcomer_fingerprints: BTreeSet<&str> =
            newcomers.keys().map(String::as_str).collect();

        if joins != newcomer_fingerprints {
            return Err(ValidationError::BadMembersChanges(
                "membersChanges joins do not match this block's newcomer keychanges".to_string(),
            ));
        }
        Ok(())
    }
}
