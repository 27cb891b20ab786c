//! A `KeyOracle` test double. Real OpenPGP material can't be hand-built
//! without running the toolchain, so key material, signatures and
//! certifications here are plain delimited strings instead of PGP packets.
//! The shapes `KeychangeValidator`/`BlockValidator` expect — fingerprint,
//! userid, issuer resolution, byte-for-byte verification — are preserved;
//! only the wire format is fake.

use keychain_core::{CryptoError, DecomposedKey, KeyOracle};

pub struct FakeOracle;

fn key_material(fingerprint: &str, userid: &str) -> Vec<u8> {
    format!("KEY|{fingerprint}|{userid}").into_bytes()
}

fn parse_key(material: &[u8]) -> Result<(String, String), CryptoError> {
    let text = std::str::from_utf8(material)
        .map_err(|e| CryptoError::Malformed(e.to_string()))?;
    let mut parts = text.splitn(3, '|');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("KEY"), Some(fpr), Some(userid)) => Ok((fpr.to_string(), userid.to_string())),
        _ => Err(CryptoError::Malformed(format!("not a fake key blob: {text}"))),
    }
}

fn sign(signer_fingerprint: &str, data: &[u8]) -> Vec<u8> {
    format!("SIG|{signer_fingerprint}|{}", hex::encode(data)).into_bytes()
}

/// Mirrors `TrustedKey::key_id`: a real signature only ever carries its
/// issuer's keyID, not the full fingerprint, so certifier resolution must
/// go through the keyID index.
fn key_id_of(fingerprint: &str) -> &str {
    if fingerprint.len() >= 16 {
        &fingerprint[fingerprint.len() - 16..]
    } else {
        fingerprint
    }
}

fn certify(issuer_fingerprint: &str, target_uid: &str, target_fingerprint: &str) -> Vec<u8> {
    let issuer_key_id = key_id_of(issuer_fingerprint);
    format!("CERT|{issuer_key_id}|{target_uid}|{target_fingerprint}").into_bytes()
}

impl KeyOracle for FakeOracle {
    fn issuer_of(&self, signature: &[u8]) -> Result<String, CryptoError> {
        let text = std::str::from_utf8(signature)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        let mut parts = text.splitn(3, '|');
        match (parts.next(), parts.next()) {
            (Some("CERT"), Some(issuer)) => Ok(issuer.to_string()),
            _ => Err(CryptoError::Malformed(format!("not a fake cert packet: {text}"))),
        }
    }

    fn verify_detached(
        &self,
        public_key: &[u8],
        data: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        let (fingerprint, _) = parse_key(public_key)?;
        Ok(signature == sign(&fingerprint, data))
    }

    fn verify_certification(
        &self,
        issuer_primary_key: &[u8],
        target_uid: &str,
        target_primary_key: &[u8],
        cert_packet: &[u8],
    ) -> Result<bool, CryptoError> {
        let (issuer_fingerprint, _) = parse_key(issuer_primary_key)?;
        let (target_fingerprint, _) = parse_key(target_primary_key)?;
        Ok(cert_packet == certify(&issuer_fingerprint, target_uid, &target_fingerprint))
    }

    fn decompose(&self, key_material: &[u8]) -> Result<DecomposedKey, CryptoError> {
        let (fingerprint, user_id) = parse_key(key_material)?;
        Ok(DecomposedKey {
            fingerprint,
            primary_key: key_material.to_vec(),
            user_id,
            self_certification: Vec::new(),
            other_certifications: Vec::new(),
            subkeys: Vec::new(),
            subkey_bindings: Vec::new(),
        })
    }

    fn reencode_matches(
        &self,
        _decomposed: &DecomposedKey,
        _certifications: &[Vec<u8>],
        _expected: &[u8],
    ) -> Result<bool, CryptoError> {
        Ok(true)
    }

    fn is_subkeys_only(&self, packets: &[u8]) -> Result<bool, CryptoError> {
        let text = std::str::from_utf8(packets).map_err(|e| CryptoError::Malformed(e.to_string()))?;
        Ok(text.starts_with("SUBKEY|"))
    }
}

/// A founder/member with fake key material ready to certify or be certified.
pub struct FakeIdentity {
    pub fingerprint: String,
    pub userid: String,
}

impl FakeIdentity {
    pub fn new(fingerprint: &str, userid: &str) -> Self {
        Self {
            fingerprint: fingerprint.to_string(),
            userid: userid.to_string(),
        }
    }

    pub fn keypackets(&self) -> Vec<u8> {
        key_material(&self.fingerprint, &self.userid)
    }

    pub fn certify(&self, target: &FakeIdentity) -> Vec<u8> {
        certify(&self.fingerprint, &target.userid, &target.fingerprint)
    }
}

use keychain_core::{Membership, MembershipKind};

pub fn membership_in(identity: &FakeIdentity, date: i64) -> Membership {
    let hash = format!("membership-hash|{}|{}", identity.fingerprint, date);
    let signature = sign(&identity.fingerprint, hash.as_bytes());
    Membership {
        issuer: identity.fingerprint.clone(),
        userid: identity.userid.clone(),
        membership: MembershipKind::In,
        date,
        hash,
        signature,
        eligible: true,
        propagated: false,
    }
}

use keychain_core::{Keychange, NewcomerKeychange};

pub fn newcomer_keychange(
    identity: &FakeIdentity,
    membership: Membership,
    certifiers: &[&FakeIdentity],
) -> Keychange {
    let certpackets = certifiers.iter().map(|c| c.certify(identity)).collect();
    Keychange::Newcomer(NewcomerKeychange {
        fingerprint: identity.fingerprint.clone(),
        keypackets: identity.keypackets(),
        certpackets,
        membership,
        certifiers: Vec::new(),
    })
}

use keychain_core::Keyblock;

/// Increments `nonce` until the block's hash clears `required` leading
/// zero hex digits. Mirrors what `PowEngine::prove` does, without the
/// async cancellation machinery a synchronous test has no use for.
pub fn mine(mut block: Keyblock, required: u32) -> Keyblock {
    loop {
        block.hash = block.compute_hash();
        if Keyblock::leading_zero_hex_digits(&block.hash) >= required {
            return block;
        }
        block.nonce += 1;
    }
}

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use keychain_core::Clock;

/// A `Clock` the test can move forward on demand, so timestamp-window and
/// per-issuer-penalty checks are exercised deterministically.
#[derive(Clone)]
pub struct FixedClock(Arc<AtomicI64>);

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self(Arc::new(AtomicI64::new(now)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.get()
    }
}
