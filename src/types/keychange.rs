use serde::{Deserialize, Serialize};

use super::membership::Membership;

/// Discriminant for [`Keychange`], kept as its own type so error messages
/// and `NotImplementedKeychange` can report it without cloning the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeychangeKind {
    Newcomer,
    Update,
    Leaver,
    Back,
}

/// Raw OpenPGP packet material as it rides inside a block, before the
/// [`crate::crypto::KeyOracle`] decodes it. Opaque to everything except
/// the crypto layer and the byte-for-byte recomposition check (spec §4.3
/// step 3).
pub type PacketBlob = Vec<u8>;

/// One entry of `keysChanges` (spec §3). A closed, per-variant-required-
/// fields enum, per spec §9: this turns "LEAVER/BACK not implemented" into
/// an exhaustive `match` arm instead of a runtime string check on a `type`
/// field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Keychange {
    #[serde(rename = "N")]
    Newcomer(NewcomerKeychange),
    #[serde(rename = "U")]
    Update(UpdateKeychange),
    #[serde(rename = "L")]
    Leaver(LeaverKeychange),
    #[serde(rename = "B")]
    Back(BackKeychange),
}

impl Keychange {
    pub fn kind(&self) -> KeychangeKind {
        match self {
            Keychange::Newcomer(_) => KeychangeKind::Newcomer,
            Keychange::Update(_) => KeychangeKind::Update,
            Keychange::Leaver(_) => KeychangeKind::Leaver,
            Keychange::Back(_) => KeychangeKind::Back,
        }
    }

    /// Fingerprint this keychange concerns, regardless of kind.
    pub fn fingerprint(&self) -> &str {
        match self {
            Keychange::Newcomer(n) => &n.fingerprint,
            Keychange::Update(u) => &u.fingerprint,
            Keychange::Leaver(l) => &l.fingerprint,
            Keychange::Back(b) => &b.fingerprint,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewcomerKeychange {
    pub fingerprint: String,
    /// Recomposed, line-ending-normalized primary key + udid2 userid +
    /// self-certification + certifications + subkeys + subkey bindings.
    pub keypackets: PacketBlob,
    /// Third-party certification packets over this key's userid.
    pub certpackets: Vec<PacketBlob>,
    pub membership: Membership,
    /// Filled in by [`crate::keychange::KeychangeValidator`] after each
    /// certification packet's issuer is resolved (spec §4.3 step 4).
    #[serde(default)]
    pub certifiers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateKeychange {
    pub fingerprint: String,
    /// Non-empty only when the member declares new subkeys; contains only
    /// subkey and subkey-binding packets (spec §4.3 UPDATE step 3).
    #[serde(default)]
    pub keypackets: PacketBlob,
    /// Non-empty only when the member gained new certifications; contains
    /// only certification packets (spec §4.3 UPDATE step 4).
    #[serde(default)]
    pub certpackets: Vec<PacketBlob>,
    #[serde(default)]
    pub certifiers: Vec<String>,
}

/// Reserved: rejected unconditionally with `NotImplementedKeychange` until
/// a rule set is specified (spec §4.3, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaverKeychange {
    pub fingerprint: String,
}

/// Reserved: rejected unconditionally with `NotImplementedKeychange` until
/// a rule set is specified (spec §4.3, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackKeychange {
    pub fingerprint: String,
}
