use crate::types::PacketBlob;

/// A public key decomposed into the packet groups the validator needs to
/// reason about independently (spec §4.1).
#[derive(Debug, Clone)]
pub struct DecomposedKey {
    pub fingerprint: String,
    pub primary_key: PacketBlob,
    pub user_id: String,
    pub self_certification: PacketBlob,
    pub other_certifications: Vec<PacketBlob>,
    pub subkeys: Vec<PacketBlob>,
    pub subkey_bindings: Vec<PacketBlob>,
}

/// Signature verification and key decomposition, consumed as a library
/// (spec §4.1, §2 C1). Any malformed input is surfaced as
/// [`crate::types::ValidationError::BadCrypto`] by callers — this trait
/// itself returns plain [`CryptoError`] so it stays independent of the
/// validation pipeline's error type.
pub trait KeyOracle: Send + Sync {
    /// 16 hex char key id of whoever produced `signature`.
    fn issuer_of(&self, signature: &[u8]) -> Result<String, CryptoError>;

    /// Verify a detached signature over `data` made by `public_key`.
    fn verify_detached(
        &self,
        public_key: &[u8],
        data: &[u8],
        signature: &[u8],
    ) -> Result<bool, CryptoError>;

    /// Verify that `cert_packet` is a valid certification by
    /// `issuer_primary_key` over `target_primary_key`'s `target_uid`.
    fn verify_certification(
        &self,
        issuer_primary_key: &[u8],
        target_uid: &str,
        target_primary_key: &[u8],
        cert_packet: &[u8],
    ) -> Result<bool, CryptoError>;

    /// Decompose an armored/binary key into its constituent packet groups.
    fn decompose(&self, key_material: &[u8]) -> Result<DecomposedKey, CryptoError>;

    /// Whether `packets` consists solely of subkey and subkey-binding
    /// packets, with no primary key, userid, or userid-certification packet
    /// smuggled in (spec §4.3 UPDATE step 3).
    fn is_subkeys_only(&self, packets: &[u8]) -> Result<bool, CryptoError>;

    /// Re-encode the fixed packet subset (primary key, udid2 userid, self
    /// certification, certifications, subkeys, subkey bindings) and compare
    /// byte-for-byte, after UNIX->DOS line-ending normalization, with
    /// `expected` (spec §4.1, §4.3 NEWCOMER step 3).
    fn reencode_matches(
        &self,
        decomposed: &DecomposedKey,
        certifications: &[PacketBlob],
        expected: &[u8],
    ) -> Result<bool, CryptoError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),
}

/// Normalize UNIX line endings to DOS, as required before the byte-for-byte
/// comparison in spec §4.1/§4.3 step 3.
pub fn normalize_unix_to_dos(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if b == b'\n' && (i == 0 || data[i - 1] != b'\r') {
            out.push(b'\r');
        }
        out.push(b);
        i += 1;
    }
    out
}
