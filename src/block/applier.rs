use tracing::instrument;

use crate::storage::{BlockStore, LinkStore, MemberIndex, MembershipPoolStore, TrustedKeyStore};
use crate::types::{Keychange, Keyblock, Result, TrustedKey};

use super::validator::BlockValidation;

/// Persists an already-validated block (spec §2 C6, §4.5). Every step here
/// assumes [`super::validator::BlockValidator::validate`] already accepted
/// the block — this never re-derives or re-checks anything, it only
/// writes the artifacts validation already computed.
pub struct BlockApplier<'a> {
    blocks: &'a dyn BlockStore,
    members: &'a dyn MemberIndex,
    links: &'a dyn LinkStore,
    keys: &'a dyn TrustedKeyStore,
    pool: &'a dyn MembershipPoolStore,
}

impl<'a> BlockApplier<'a> {
    pub fn new(
        blocks: &'a dyn BlockStore,
        members: &'a dyn MemberIndex,
        links: &'a dyn LinkStore,
        keys: &'a dyn TrustedKeyStore,
        pool: &'a dyn MembershipPoolStore,
    ) -> Self {
        Self {
            blocks,
            members,
            links,
            keys,
            pool,
        }
    }

    #[instrument(skip(self, block, validation), fields(number = block.number))]
    pub fn apply(&self, block: &Keyblock, validation: &BlockValidation) -> Result<()> {
        self.apply_keychanges(block)?;
        self.apply_members_changes(block)?;
        for link in &validation.new_links {
            self.links.save(link.clone())?;
        }
        self.apply_kick_rows(validation)?;
        self.blocks.save(block.clone())?;
        Ok(())
    }

    fn apply_keychanges(&self, block: &Keyblock) -> Result<()> {
        for keychange in &block.keys_changes {
            match keychange {
                Keychange::Newcomer(n) => {
                    self.keys.save(TrustedKey {
                        fingerprint: n.fingerprint.clone(),
                        uid: n.membership.userid.clone(),
                        packets: n.keypackets.clone(),
                    })?;
                    self.pool.remove_for(&n.membership.issuer, &n.membership.hash)?;
                }
                Keychange::Update(u) => {
                    if let Some(mut current) = self.keys.get_the_one(&u.fingerprint)? {
                        current.packets.extend_from_slice(&u.keypackets);
                        for cert in &u.certpackets {
                            current.packets.extend_from_slice(cert);
                        }
                        self.keys.save(current)?;
                    }
                }
                Keychange::Leaver(_) | Keychange::Back(_) => {
                    // Unreachable: validation already rejects these kinds.
                }
            }
        }
        Ok(())
    }

    fn apply_members_changes(&self, block: &Keyblock) -> Result<()> {
        for change in &block.members_changes {
            if change.is_join() {
                self.members.add_member(change.fingerprint())?;
            } else {
                self.members.remove_member(change.fingerprint())?;
            }
        }
        Ok(())
    }

    fn apply_kick_rows(&self, validation: &BlockValidation) -> Result<()> {
        for (fingerprint, row) in &validation.kick_rows {
            if row.kick {
                self.members.set_kicked(fingerprint, row.distanced.clone())?;
            } else {
                self.members.unset_kicked(fingerprint)?;
            }
        }
        Ok(())
    }
}
