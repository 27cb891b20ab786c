use crate::crypto::KeyOracle;
use crate::types::{
    CertLink, Keychange, KeychangeKind, MembershipKind, TrustedKey, ValidationError,
};
use crate::wot::is_valid_udid2;

/// Looks up the currently trusted key material for a member, by
/// fingerprint. Kept as a narrow trait (rather than depending on the full
/// storage layer) so [`KeychangeValidator`] stays testable on its own
/// (spec §2 C4, consumed against [`crate::storage::TrustedKeyStore`] and
/// [`crate::storage::MemberIndex`]).
pub trait TrustedKeyLookup {
    fn key_for(&self, fpr_or_key_id: &str) -> Option<TrustedKey>;

    /// Whether `fingerprint` is eligible to certify, i.e. is currently a
    /// member of the WoT, or is a co-newcomer being admitted in this same
    /// block (spec §4.3 step 4 "(a) an entry in newKeys" / "(b) ... is
    /// currently a member").
    fn is_member(&self, fingerprint: &str) -> bool;
}

/// Outcome of validating a single keychange: the certification links it
/// establishes, to be folded into the block's `extraLinks` before the WoT
/// stability check (spec §4.3 step 4, §4.4 step 6).
#[derive(Debug, Clone, Default)]
pub struct ValidatedKeychange {
    pub new_links: Vec<CertLink>,
    pub certifiers: Vec<String>,
}

/// Validates individual `keysChanges` entries (spec §2 C4). NEWCOMER and
/// UPDATE are fully implemented; LEAVER and BACK are closed-enum variants
/// that are always rejected until a rule set exists for them (spec §9).
pub struct KeychangeValidator<'a, O: KeyOracle> {
    oracle: &'a O,
}

impl<'a, O: KeyOracle> KeychangeValidator<'a, O> {
    pub fn new(oracle: &'a O) -> Self {
        Self { oracle }
    }

    pub fn validate(
        &self,
        keychange: &Keychange,
        as_of: i64,
        lookup: &dyn TrustedKeyLookup,
    ) -> Result<ValidatedKeychange, ValidationError> {
        match keychange {
            Keychange::Newcomer(n) => self.validate_newcomer(n, as_of, lookup),
            Keychange::Update(u) => self.validate_update(u, lookup),
            Keychange::Leaver(_) | Keychange::Back(_) => {
                Err(ValidationError::NotImplementedKeychange(keychange.kind()))
            }
        }
    }

    fn validate_newcomer(
        &self,
        n: &crate::types::NewcomerKeychange,
        as_of: i64,
        lookup: &dyn TrustedKeyLookup,
    ) -> Result<ValidatedKeychange, ValidationError> {
        let bad = |reason: &str| ValidationError::BadKeychange {
            fingerprint: n.fingerprint.clone(),
            reason: reason.to_string(),
        };

        if n.membership.membership != MembershipKind::In {
            return Err(bad("a newcomer keychange must carry an IN membership"));
        }
        if !is_valid_udid2(&n.membership.userid) {
            return Err(bad("membership userid is not a valid udid2 identity"));
        }

        let decomposed = self
            .oracle
            .decompose(&n.keypackets)
            .map_err(|e| bad(&format!("key material did not decompose: {e}")))?;

        if decomposed.fingerprint != n.fingerprint {
            return Err(bad("decomposed fingerprint does not match keychange fingerprint"));
        }
        if decomposed.user_id != n.membership.userid {
            return Err(bad("key's self-claimed userid does not match membership userid"));
        }

        let matches = self
            .oracle
            .reencode_matches(&decomposed, &n.certpackets, &n.keypackets)
            .map_err(|e| bad(&format!("crypto error during reencoding check: {e}")))?;
        if !matches {
            return Err(bad("keypackets do not reencode to the submitted bytes"));
        }

        let verified = self
            .oracle
            .verify_detached(
                &decomposed.primary_key,
                n.membership.hash.as_bytes(),
                &n.membership.signature,
            )
            .map_err(|e| bad(&format!("crypto error verifying membership signature: {e}")))?;
        if !verified {
            return Err(bad("membership signature does not verify against the new key"));
        }

        let (new_links, certifiers) =
            self.resolve_certifications(&n.fingerprint, &decomposed.primary_key, &n.membership.userid, &n.certpackets, as_of, lookup)?;

        Ok(ValidatedKeychange {
            new_links,
            certifiers,
        })
    }

    fn validate_update(
        &self,
        u: &crate::types::UpdateKeychange,
        lookup: &dyn TrustedKeyLookup,
    ) -> Result<ValidatedKeychange, ValidationError> {
        let bad = |reason: &str| ValidationError::BadKeychange {
            fingerprint: u.fingerprint.clone(),
            reason: reason.to_string(),
        };

        let current = lookup
            .key_for(&u.fingerprint)
            .ok_or_else(|| bad("no trusted key on file for this fingerprint"))?;

        if u.certpackets.is_empty() && u.keypackets.is_empty() {
            return Err(bad("update carries neither new certifications nor new subkeys"));
        }

        if !u.keypackets.is_empty() {
            let subkeys_only = self
                .oracle
                .is_subkeys_only(&u.keypackets)
                .map_err(|e| bad(&format!("crypto error inspecting keypackets: {e}")))?;
            if !subkeys_only {
                return Err(bad("keypackets must contain only subkeys and subkey bindings"));
            }
        }

        let decomposed = self
            .oracle
            .decompose(&current.packets)
            .map_err(|e| bad(&format!("existing key did not decompose: {e}")))?;

        let (new_links, certifiers) = if u.certpackets.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            self.resolve_certifications(
                &u.fingerprint,
                &decomposed.primary_key,
                &decomposed.user_id,
                &u.certpackets,
                0,
                lookup,
            )?
        };

        Ok(ValidatedKeychange {
            new_links,
            certifiers,
        })
    }

    fn resolve_certifications(
        &self,
        target_fingerprint: &str,
        target_primary_key: &[u8],
        target_uid: &str,
        cert_packets: &[Vec<u8>],
        timestamp: i64,
        lookup: &dyn TrustedKeyLookup,
    ) -> Result<(Vec<CertLink>, Vec<String>), ValidationError> {
        let bad = |reason: String| ValidationError::BadKeychange {
            fingerprint: target_fingerprint.to_string(),
            reason,
        };

        let mut links = Vec::new();
        let mut certifiers = Vec::new();

        for cert_packet in cert_packets {
            let issuer_key_id = self
                .oracle
                .issuer_of(cert_packet)
                .map_err(|e| bad(format!("could not resolve certification issuer: {e}")))?;
            let issuer_key = lookup
                .key_for(&issuer_key_id)
                .ok_or_else(|| bad(format!("certifier {issuer_key_id} is not a trusted key")))?;
            if !lookup.is_member(&issuer_key.fingerprint) {
                return Err(bad(format!(
                    "certifier {} is not currently a member",
                    issuer_key.fingerprint
                )));
            }

            let verified = self
                .oracle
                .verify_certification(&issuer_key.packets, target_uid, target_primary_key, cert_packet)
                .map_err(|e| bad(format!("crypto error verifying certification: {e}")))?;
            if !verified {
                return Err(bad(format!(
                    "certification from {issuer_key_id} does not verify"
                )));
            }

            links.push(CertLink {
                source: issuer_key.fingerprint.clone(),
                target: target_fingerprint.to_string(),
                timestamp,
            });
            certifiers.push(issuer_key.fingerprint);
        }

        Ok((links, certifiers))
    }
}

pub fn is_reserved_kind(kind: KeychangeKind) -> bool {
    matches!(kind, KeychangeKind::Leaver | KeychangeKind::Back)
}
