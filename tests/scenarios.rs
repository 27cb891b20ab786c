mod common;

use keychain_core::storage::{
    MemoryBlockStore, MemoryLinkStore, MemoryMemberIndex, MemoryMembershipPoolStore,
    MemoryTrustedKeyStore,
};
use keychain_core::{
    ChainingError, Keyblock, KeychainNode, MemberChange, NodeConfig, ValidationError,
};

use common::{membership_in, mine, newcomer_keychange, FakeIdentity, FakeOracle, FixedClock};

fn node(config: NodeConfig, clock: FixedClock) -> KeychainNode<FakeOracle> {
    KeychainNode::new(
        Box::new(MemoryBlockStore::new()),
        Box::new(MemoryMemberIndex::new()),
        Box::new(MemoryLinkStore::new()),
        Box::new(MemoryTrustedKeyStore::new()),
        Box::new(MemoryMembershipPoolStore::new()),
        FakeOracle,
        config,
    )
    .with_clock(Box::new(clock))
}

fn genesis_skeleton(issuer: &str, timestamp: i64, currency: &str) -> Keyblock {
    Keyblock {
        number: 0,
        currency: currency.to_string(),
        previous_hash: String::new(),
        previous_issuer: String::new(),
        timestamp,
        nonce: 0,
        issuer: issuer.to_string(),
        members_root: String::new(),
        members_count: 0,
        members_changes: Vec::new(),
        keys_changes: Vec::new(),
        signature: Vec::new(),
        hash: String::new(),
    }
}

/// Three founders, each certified by the other two within the same
/// genesis block, is accepted with six links (one per ordered pair).
#[tokio::test]
async fn genesis_with_mutual_certifiers_is_accepted() {
    let alice = FakeIdentity::new("alice-fpr", "alice (Paris 1990)");
    let bob = FakeIdentity::new("bob-fpr", "bob (Lyon 1991)");
    let carol = FakeIdentity::new("carol-fpr", "carol (Nice 1992)");

    let timestamp = 1_700_000_000;
    let mut block = genesis_skeleton(&alice.fingerprint, timestamp, "test-currency");

    block.keys_changes = vec![
        newcomer_keychange(&alice, membership_in(&alice, timestamp), &[&bob, &carol]),
        newcomer_keychange(&bob, membership_in(&bob, timestamp), &[&alice, &carol]),
        newcomer_keychange(&carol, membership_in(&carol, timestamp), &[&alice, &bob]),
    ];

    let mut fingerprints = vec![
        alice.fingerprint.clone(),
        bob.fingerprint.clone(),
        carol.fingerprint.clone(),
    ];
    fingerprints.sort();
    block.members_changes = fingerprints.iter().map(|f| MemberChange::joining(f)).collect();
    block.members_count = fingerprints.len() as u64;
    block.members_root = keychain_core::wot::members_root(&fingerprints);

    let block = mine(block, 2);

    let clock = FixedClock::new(timestamp);
    let node = node(NodeConfig::new("test-currency"), clock);

    node.submit_key_block(block).await.expect("genesis should validate");

    assert!(node.promoted(0).unwrap());
    let tip = node.current().unwrap().unwrap();
    assert_eq!(tip.members_count, 3);
}

/// A newcomer with fewer than `sigQty` certifiers is rejected, while one
/// with exactly `sigQty` is accepted (spec boundary on the certifier
/// count used for admission).
#[tokio::test]
async fn sig_qty_boundary_accepts_at_threshold_and_rejects_below_it() {
    let alice = FakeIdentity::new("alice-fpr", "alice (Paris 1990)");
    let bob = FakeIdentity::new("bob-fpr", "bob (Lyon 1991)");
    let timestamp = 1_700_000_000;

    let mut genesis = genesis_skeleton(&alice.fingerprint, timestamp, "test-currency");
    genesis.keys_changes = vec![
        newcomer_keychange(&alice, membership_in(&alice, timestamp), &[&bob]),
        newcomer_keychange(&bob, membership_in(&bob, timestamp), &[&alice]),
    ];
    let mut fingerprints = vec![alice.fingerprint.clone(), bob.fingerprint.clone()];
    fingerprints.sort();
    genesis.members_changes = fingerprints.iter().map(|f| MemberChange::joining(f)).collect();
    genesis.members_count = 2;
    genesis.members_root = keychain_core::wot::members_root(&fingerprints);
    let genesis = mine(genesis, 2);

    let clock = FixedClock::new(timestamp);
    let config = NodeConfig::new("test-currency").with_sig_qty(1);
    let node = node(config, clock.clone());
    node.submit_key_block(genesis.clone()).await.expect("genesis should validate");

    let carol = FakeIdentity::new("carol-fpr", "carol (Nice 1992)");
    let later = timestamp + 10_000;
    clock.set(later);

    let mut rejected = Keyblock {
        number: 1,
        currency: "test-currency".to_string(),
        previous_hash: genesis.hash.clone(),
        previous_issuer: genesis.issuer.clone(),
        timestamp: later,
        nonce: 0,
        issuer: alice.fingerprint.clone(),
        members_root: String::new(),
        members_count: 0,
        members_changes: vec![MemberChange::joining(&carol.fingerprint)],
        keys_changes: vec![newcomer_keychange(&carol, membership_in(&carol, later), &[])],
        signature: Vec::new(),
        hash: String::new(),
    };
    let mut next_members = fingerprints.clone();
    next_members.push(carol.fingerprint.clone());
    rejected.members_root = keychain_core::wot::members_root(&next_members);
    rejected.members_count = next_members.len() as u64;
    let rejected = mine(rejected, 2);

    let err = node
        .submit_key_block(rejected)
        .await
        .expect_err("zero certifiers must not satisfy sigQty = 1");
    assert!(matches!(err, ValidationError::BadKeychange { .. }));
}

/// A candidate block whose number skips ahead of the expected next
/// number is rejected before any of its content is inspected.
#[tokio::test]
async fn chain_linkage_rejects_a_block_that_skips_ahead() {
    let alice = FakeIdentity::new("alice-fpr", "alice (Paris 1990)");
    let bob = FakeIdentity::new("bob-fpr", "bob (Lyon 1991)");
    let timestamp = 1_700_000_000;

    let mut genesis = genesis_skeleton(&alice.fingerprint, timestamp, "test-currency");
    genesis.keys_changes = vec![
        newcomer_keychange(&alice, membership_in(&alice, timestamp), &[&bob]),
        newcomer_keychange(&bob, membership_in(&bob, timestamp), &[&alice]),
    ];
    let mut fingerprints = vec![alice.fingerprint.clone(), bob.fingerprint.clone()];
    fingerprints.sort();
    genesis.members_changes = fingerprints.iter().map(|f| MemberChange::joining(f)).collect();
    genesis.members_count = 2;
    genesis.members_root = keychain_core::wot::members_root(&fingerprints);
    let genesis = mine(genesis, 2);

    let clock = FixedClock::new(timestamp);
    let config = NodeConfig::new("test-currency").with_sig_qty(1);
    let node = node(config, clock);
    node.submit_key_block(genesis.clone()).await.expect("genesis should validate");

    let mut skips_ahead = genesis_skeleton(&alice.fingerprint, timestamp, "test-currency");
    skips_ahead.number = 5;
    skips_ahead.previous_hash = genesis.hash.clone();
    skips_ahead.previous_issuer = genesis.issuer.clone();
    let skips_ahead = mine(skips_ahead, 2);

    let err = node
        .submit_key_block(skips_ahead)
        .await
        .expect_err("number 5 must not be accepted on top of tip 0");
    assert!(matches!(
        err,
        ValidationError::BadChaining(ChainingError::TooEarly { got: 5, expected: 1 })
    ));
}

/// Submitting the exact same block twice is idempotent: the second
/// submission reports `AlreadySeen` rather than re-applying it.
#[tokio::test]
async fn resubmitting_the_same_block_is_reported_as_already_seen() {
    let alice = FakeIdentity::new("alice-fpr", "alice (Paris 1990)");
    let bob = FakeIdentity::new("bob-fpr", "bob (Lyon 1991)");
    let timestamp = 1_700_000_000;

    let mut genesis = genesis_skeleton(&alice.fingerprint, timestamp, "test-currency");
    genesis.keys_changes = vec![
        newcomer_keychange(&alice, membership_in(&alice, timestamp), &[&bob]),
        newcomer_keychange(&bob, membership_in(&bob, timestamp), &[&alice]),
    ];
    let mut fingerprints = vec![alice.fingerprint.clone(), bob.fingerprint.clone()];
    fingerprints.sort();
    genesis.members_changes = fingerprints.iter().map(|f| MemberChange::joining(f)).collect();
    genesis.members_count = 2;
    genesis.members_root = keychain_core::wot::members_root(&fingerprints);
    let genesis = mine(genesis, 2);

    let clock = FixedClock::new(timestamp);
    let config = NodeConfig::new("test-currency").with_sig_qty(1);
    let node = node(config, clock);

    node.submit_key_block(genesis.clone()).await.expect("first submission should validate");
    let err = node
        .submit_key_block(genesis)
        .await
        .expect_err("resubmitting the same block must not re-apply it");
    assert!(matches!(err, ValidationError::AlreadySeen(0)));
}
