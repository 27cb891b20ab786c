use sequoia_openpgp::cert::Cert;
use sequoia_openpgp::packet::{Packet, Signature};
use sequoia_openpgp::parse::{PacketParser, Parse};
use sequoia_openpgp::policy::StandardPolicy;
use sequoia_openpgp::serialize::MarshalInto;
use sequoia_openpgp::types::SignatureType;

use super::oracle::{normalize_unix_to_dos, CryptoError, DecomposedKey, KeyOracle};

const POLICY: &StandardPolicy<'static> = &StandardPolicy::new();

/// Default [`KeyOracle`] implementation, backed by `sequoia-openpgp`
/// (the de facto standard OpenPGP crate in the Rust ecosystem). spec §4.1
/// treats "OpenPGP key parsing" as an externally supplied library; this is
/// the concrete library the rest of the crate is built and tested against.
#[derive(Debug, Default)]
pub struct SequoiaKeyOracle;

impl SequoiaKeyOracle {
    pub fn new() -> Self {
        Self
    }

    fn first_signature_packet(data: &[u8]) -> Result<Signature, CryptoError> {
        let mut ppr = PacketParser::from_bytes(data)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        while let sequoia_openpgp::parse::PacketParserResult::Some(pp) = ppr {
            let (packet, next) = pp
                .recurse()
                .map_err(|e| CryptoError::Malformed(e.to_string()))?;
            if let Packet::Signature(sig) = packet {
                return Ok(sig);
            }
            ppr = next;
        }
        Err(CryptoError::Malformed(
            "no signature packet found".to_string(),
        ))
    }
}

impl KeyOracle for SequoiaKeyOracle {
    fn issuer_of(&self, signature: &[u8]) -> Result<String, CryptoError> {
        let sig = Self::first_signature_packet(signature)?;
        let handle = sig
            .issuers()
            .next()
            .ok_or_else(|| CryptoError::Malformed("signature carries no issuer".into()))?;
        Ok(handle.to_hex().to_lowercase())
    }

    fn verify_detached(
        &self,
        public_key: &[u8],
        data: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        let cert =
            Cert::from_bytes(public_key).map_err(|e| CryptoError::Malformed(e.to_string()))?;
        let valid_cert = cert
            .with_policy(POLICY, None)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        let sig = Self::first_signature_packet(signature)?;

        for key in valid_cert.keys() {
            let mut key_amalgamation = key.key().clone();
            if sig.verify_message(&mut key_amalgamation, data).is_ok() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn verify_certification(
        &self,
        issuer_primary_key: &[u8],
        target_uid: &str,
        target_primary_key: &[u8],
        cert_packet: &[u8],
    ) -> Result<bool, CryptoError> {
        let issuer_cert = Cert::from_bytes(issuer_primary_key)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        let target_cert = Cert::from_bytes(target_primary_key)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;

        let sig = Self::first_signature_packet(cert_packet)?;
        if sig.typ() != SignatureType::GenericCertification
            && sig.typ() != SignatureType::PositiveCertification
            && sig.typ() != SignatureType::CasualCertification
            && sig.typ() != SignatureType::PersonaCertification
        {
            return Err(CryptoError::VerificationFailed(
                "packet is not a certification signature".to_string(),
            ));
        }

        let issuer_key = issuer_cert.primary_key().key().clone();
        let target_primary = target_cert.primary_key().key().clone();
        let target_userid = sequoia_openpgp::packet::UserID::from(target_uid);

        let mut issuer_key_mut = issuer_key;
        sig.verify_userid_binding(&mut issuer_key_mut, &target_primary, &target_userid)
            .map(|_| true)
            .or(Ok(false))
    }

    fn decompose(&self, key_material: &[u8]) -> Result<DecomposedKey, CryptoError> {
        let cert =
            Cert::from_bytes(key_material).map_err(|e| CryptoError::Malformed(e.to_string()))?;
        let valid_cert = cert
            .with_policy(POLICY, None)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;

        let fingerprint = cert.fingerprint().to_hex().to_lowercase();
        let primary_key = cert
            .primary_key()
            .key()
            .to_vec()
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;

        let user_id = valid_cert
            .userids()
            .next()
            .ok_or_else(|| CryptoError::Malformed("key carries no userid".into()))?
            .userid()
            .clone();
        let user_id_str = String::from_utf8_lossy(user_id.value()).to_string();

        let self_certification = valid_cert
            .userids()
            .next()
            .and_then(|u| u.binding_signature(POLICY, None).ok()?.to_vec().ok())
            .ok_or_else(|| CryptoError::Malformed("missing self-certification".into()))?;

        let other_certifications: Vec<Vec<u8>> = valid_cert
            .userids()
            .next()
            .map(|u| {
                u.certifications()
                    .filter_map(|s| s.to_vec().ok())
                    .collect()
            })
            .unwrap_or_default();

        let subkeys: Vec<Vec<u8>> = valid_cert
            .keys()
            .subkeys()
            .filter_map(|k| k.key().to_vec().ok())
            .collect();
        let subkey_bindings: Vec<Vec<u8>> = valid_cert
            .keys()
            .subkeys()
            .filter_map(|k| k.binding_signature(POLICY, None).ok()?.to_vec().ok())
            .collect();

        Ok(DecomposedKey {
            fingerprint,
            primary_key,
            user_id: user_id_str,
            self_certification,
            other_certifications,
            subkeys,
            subkey_bindings,
        })
    }

    fn is_subkeys_only(&self, packets: &[u8]) -> Result<bool, CryptoError> {
        let mut ppr =
            PacketParser::from_bytes(packets).map_err(|e| CryptoError::Malformed(e.to_string()))?;
        let mut saw_any = false;
        while let sequoia_openpgp::parse::PacketParserResult::Some(pp) = ppr {
            let (packet, next) = pp
                .recurse()
                .map_err(|e| CryptoError::Malformed(e.to_string()))?;
            saw_any = true;
            let ok = match &packet {
                Packet::PublicSubkey(_) | Packet::SecretSubkey(_) => true,
                Packet::Signature(sig) => sig.typ() == SignatureType::SubkeyBinding,
                _ => false,
            };
            if !ok {
                return Ok(false);
            }
            ppr = next;
        }
        Ok(saw_any)
    }

    fn reencode_matches(
        &self,
        decomposed: &DecomposedKey,
        certifications: &[Vec<u8>],
        expected: &[u8],
    ) -> Result<bool, CryptoError> {
        let mut recomposed = Vec::new();
        recomposed.extend_from_slice(&decomposed.primary_key);
        recomposed.extend_from_slice(decomposed.user_id.as_bytes());
        recomposed.extend_from_slice(&decomposed.self_certification);
        for cert in certifications {
            recomposed.extend_from_slice(cert);
        }
        for subkey in &decomposed.subkeys {
            recomposed.extend_from_slice(subkey);
        }
        for binding in &decomposed.subkey_bindings {
            recomposed.extend_from_slice(binding);
        }

        let normalized_recomposed = normalize_unix_to_dos(&recomposed);
        let normalized_expected = normalize_unix_to_dos(expected);
        Ok(normalized_recomposed == normalized_expected)
    }
}
