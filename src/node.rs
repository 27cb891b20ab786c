use std::collections::BTreeMap;
use std::sync::Mutex as StdMutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::{info, instrument, warn};

use crate::block::{identity_filter, BlockApplier, BlockBuilder, NewcomerFilter, BlockValidator};
use crate::config::NodeConfig;
use crate::crypto::KeyOracle;
use crate::pow::{expected_zeros, PowEngine};
use crate::storage::{BlockStore, LinkStore, MemberIndex, MembershipPoolStore, TrustedKeyStore};
use crate::types::{Keyblock, Keychange, Membership, MembershipKind, PowOutcome, Result, ValidationError};

/// Source of "now", injected so the acceptance window and per-issuer
/// penalty checks are deterministic in tests (spec §4.4 step 2, step 3).
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the unix epoch")
            .as_secs() as i64
    }
}

/// The single mutable entry point into a keychain's state (spec §2, §5).
/// Every write — block submission, block generation — is serialized
/// through `write_lock`, so the snapshot a validation pass reads is never
/// stale by the time it's applied.
pub struct KeychainNode<O: KeyOracle> {
    blocks: Box<dyn BlockStore>,
    members: Box<dyn MemberIndex>,
    links: Box<dyn LinkStore>,
    keys: Box<dyn TrustedKeyStore>,
    pool: Box<dyn MembershipPoolStore>,
    oracle: O,
    config: NodeConfig,
    clock: Box<dyn Clock>,
    write_lock: AsyncMutex<()>,
    pow: PowEngine,
    pending_keychanges: StdMutex<BTreeMap<String, Keychange>>,
}

impl<O: KeyOracle> KeychainNode<O> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        blocks: Box<dyn BlockStore>,
        members: Box<dyn MemberIndex>,
        links: Box<dyn LinkStore>,
        keys: Box<dyn TrustedKeyStore>,
        pool: Box<dyn MembershipPoolStore>,
        oracle: O,
        config: NodeConfig,
    ) -> Self {
        Self {
            blocks,
            members,
            links,
            keys,
            pool,
            oracle,
            config,
            clock: Box::new(SystemClock),
            write_lock: AsyncMutex::new(()),
            pow: PowEngine::new(),
            pending_keychanges: StdMutex::new(BTreeMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn current(&self) -> Result<Option<Keyblock>> {
        self.blocks.current()
    }

    /// Whether block `number` has already been accepted into the chain
    /// (spec GLOSSARY "promoted").
    pub fn promoted(&self, number: u64) -> Result<bool> {
        Ok(self.blocks.find_by_number(number)?.is_some())
    }

    /// Queue a signed identity document for later inclusion in a block,
    /// matched up with its membership declaration by fingerprint (spec
    /// §2 C8 "candidate pool").
    pub fn register_pending_keychange(&self, keychange: Keychange) {
        self.pending_keychanges
            .lock()
            .unwrap()
            .insert(keychange.fingerprint().to_string(), keychange);
    }

    /// Verify and queue a membership declaration (spec §3 "Lifecycle").
    /// Newcomer declarations can't be signature-checked yet — there is no
    /// trusted key on file — so they're accepted into the pool and
    /// verified for real when a keychange validator processes the block
    /// that carries their matching keychange.
    #[instrument(skip(self, membership), fields(issuer = %membership.issuer))]
    pub async fn submit_membership(&self, mut membership: Membership) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if self.members.is_member(&membership.issuer)? {
            let key = self
                .keys
                .get_the_one(&membership.issuer)?
                .ok_or_else(|| ValidationError::BadIssuer(membership.issuer.clone()))?;
            let verified = self
                .oracle
                .verify_detached(&key.packets, membership.hash.as_bytes(), &membership.signature)
                .map_err(|e| ValidationError::BadCrypto(e.to_string()))?;
            if !verified {
                return Err(ValidationError::BadCrypto(
                    "membership signature does not verify against the member's key".to_string(),
                ));
            }
        } else if membership.membership != MembershipKind::In {
            return Err(ValidationError::BadIssuer(membership.issuer.clone()));
        }

        membership.eligible = true;
        self.pool.insert(membership)
    }

    fn eligible_join_candidates(&self) -> Result<Vec<(Membership, Keychange)>> {
        let pending = self.pending_keychanges.lock().unwrap();
        let candidates = self
            .pool
            .find()?
            .into_iter()
            .filter(|m| m.eligible && m.membership == MembershipKind::In)
            .filter_map(|m| pending.get(&m.issuer).cloned().map(|kc| (m, kc)))
            .collect();
        Ok(candidates)
    }

    /// Block containing only the member-set consequences of the current
    /// kick state, no `keysChanges` (spec boundary case: kick-only block).
    pub fn generate_empty_next(&self, issuer: &str) -> Result<Keyblock> {
        let builder = self.builder();
        builder.build_updates_only(issuer, self.clock.now())
    }

    /// Block admitting as many queued newcomers as pass `filter` and the
    /// iterated WoT-stability check (spec §4.8).
    pub fn generate_newcomers(
        &self,
        issuer: &str,
        candidates: &[(Membership, Keychange)],
        filter: &NewcomerFilter,
    ) -> Result<Keyblock> {
        let builder = self.builder();
        builder.build_with_newcomers(issuer, self.clock.now(), candidates, filter)
    }

    /// Convenience wrapper: gathers eligible queued newcomers itself and
    /// admits every one that passes validation (identity filter).
    pub fn generate_newcomers_auto(&self, issuer: &str) -> Result<Keyblock> {
        let candidates = self.eligible_join_candidates()?;
        self.generate_newcomers(issuer, &candidates, &identity_filter())
    }

    /// Picks whichever of `generate_empty_next`/`generate_newcomers_auto`
    /// has something to offer, defaulting to the empty block.
    pub fn generate_next(&self, issuer: &str) -> Result<Keyblock> {
        let candidates = self.eligible_join_candidates()?;
        if candidates.is_empty() {
            self.generate_empty_next(issuer)
        } else {
            self.generate_newcomers(issuer, &candidates, &identity_filter())
        }
    }

    fn required_zeros(&self, candidate: &Keyblock) -> Result<u32> {
        if self.blocks.current()?.is_none() {
            return Ok(self.config.pow_zero_min);
        }
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

    /// Mine a nonce for `block`, cancellable via the returned engine's own
    /// `cancel` (spec §2 C7, §4.7, §5).
    pub async fn prove(&self, block: Keyblock) -> Result<PowOutcome<Keyblock>> {
        let required = self.required_zeros(&block)?;
        Ok(self.pow.prove(block, required).await)
    }

    pub async fn cancel_proving(&self) {
        self.pow.cancel().await;
    }

    fn builder(&self) -> BlockBuilder<'_, O> {
        BlockBuilder::new(
            self.blocks.as_ref(),
            self.members.as_ref(),
            self.links.as_ref(),
            self.keys.as_ref(),
            &self.oracle,
            &self.config,
        )
    }

    /// Validate and, if accepted, apply a candidate block (spec §5: the
    /// single serialized write path every other mutation funnels through).
    /// A block already on file under the same number and hash is reported
    /// as [`ValidationError::AlreadySeen`] rather than re-applied.
    #[instrument(skip(self, candidate), fields(number = candidate.number))]
    pub async fn submit_key_block(&self, candidate: Keyblock) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = self.blocks.find_by_number(candidate.number)? {
            if existing.hash == candidate.hash {
                return Err(ValidationError::AlreadySeen(candidate.number));
            }
        }

        let now = self.clock.now();
        let validation = {
            let validator = BlockValidator::new(
                self.blocks.as_ref(),
                self.members.as_ref(),
                self.links.as_ref(),
                self.keys.as_ref(),
                &self.oracle,
                &self.config,
            );
            validator.validate(&candidate, now)?
        };

        let applier = BlockApplier::new(
            self.blocks.as_ref(),
            self.members.as_ref(),
            self.links.as_ref(),
            self.keys.as_ref(),
            self.pool.as_ref(),
        );
        applier.apply(&candidate, &validation)?;

        info!(number = candidate.number, "block applied");
        Ok(())
    }
}

/// Handle to a background generate-mine-submit loop started by
/// [`spawn_generation_loop`]. Dropping it leaves the loop running;
/// `stop` must be called explicitly to end it.
pub struct GenerationHandle {
    stop: std::sync::Arc<Notify>,
    task: tokio::task::JoinHandle<()>,
}

impl GenerationHandle {
    pub async fn stop(self) {
        self.stop.notify_one();
        let _ = self.task.await;
    }
}

/// Repeatedly builds, mines and submits the next block for `issuer` until
/// stopped, pacing itself with `interval` between attempts (spec §5
/// "block generation loop"). Errors from a failed attempt are logged and
/// the loop keeps going — a single bad attempt (e.g. losing a PoW race)
/// should not end generation.
pub fn spawn_generation_loop<O>(
    node: std::sync::Arc<KeychainNode<O>>,
    issuer: String,
    interval: std::time::Duration,
) -> GenerationHandle
where
    O: KeyOracle + 'static,
{
    let stop = std::sync::Arc::new(Notify::new());
    let stop_for_task = stop.clone();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop_for_task.notified() => break,
                _ = tokio::time::sleep(interval) => {},
            }

            let candidate = match node.generate_next(&issuer) {
                Ok(block) => block,
                Err(e) => {
                    warn!(error = %e, "failed to generate a candidate block");
                    continue;
                }
            };

            let mined = match node.prove(candidate).await {
                Ok(PowOutcome::Found(block)) => block,
                Ok(PowOutcome::Cancelled) => continue,
                Err(e) => {
                    warn!(error = %e, "failed to compute proof of work");
                    continue;
                }
            };

            if let Err(e) = node.submit_key_block(mined).await {
                warn!(error = %e, "failed to submit generated block");
            }
        }
    });

    GenerationHandle { stop, task }
}
