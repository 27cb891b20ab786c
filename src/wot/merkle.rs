use sha1::{Digest, Sha1};

/// SHA-1 Merkle root of the sorted, lowercase-hex member fingerprint set
/// (spec §3 invariant 1). A pure function of the leaf set, not a stateful
/// tree with mutable `push`/`remove` operations (spec §9): a pure function
/// from bytes to a root, with no tree object kept around between calls.
pub fn members_root<I, S>(fingerprints: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut leaves: Vec<String> = fingerprints
        .into_iter()
        .map(|f| f.as_ref().to_lowercase())
        .collect();
    leaves.sort();
    leaves.dedup();

    if leaves.is_empty() {
        return hex::encode(Sha1::digest(b""));
    }

    let mut level: Vec<[u8; 20]> = leaves
        .iter()
        .map(|leaf| {
            let mut hasher = Sha1::new();
            hasher.update(leaf.as_bytes());
            let digest = hasher.finalize();
            let mut out = [0u8; 20];
            out.copy_from_slice(&digest);
            out
        })
        .collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let mut hasher = Sha1::new();
            hasher.update(pair[0]);
            if pair.len() == 2 {
                hasher.update(pair[1]);
            } else {
                // Odd node out: duplicate it up, a common Merkle convention.
                hasher.update(pair[0]);
            }
            let digest = hasher.finalize();
            let mut out = [0u8; 20];
            out.copy_from_slice(&digest);
            next.push(out);
        }
        level = next;
    }

    hex::encode(level[0])
}
