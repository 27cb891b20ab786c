use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::types::{Keyblock, PowOutcome};

/// Every 50 attempts the search loop checks for a cancellation request and
/// yields back to the runtime, so a long-running search never starves
/// other tasks on the same executor (spec §4.7, §5).
const CANCEL_CHECK_INTERVAL: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowState {
    Idle,
    Searching,
    Cancelling,
}

/// Proof-of-work search with a cooperative cancellation handshake (spec §2
/// C7, §5 "PoW cancellation"). One engine instance is shared by a node's
/// block-generation loop; `cancel` is safe to call from another task while
/// `prove` is running, and returns only once the search has actually
/// stopped mutating `block`.
pub struct PowEngine {
    state: Mutex<PowState>,
    cancel_requested: AtomicBool,
    cancel_ack: Notify,
}

impl Default for PowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PowEngine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PowState::Idle),
            cancel_requested: AtomicBool::new(false),
            cancel_ack: Notify::new(),
        }
    }

    pub fn state(&self) -> PowState {
        *self.state.lock().unwrap()
    }

    /// Search for a nonce making `block.hash` have at least
    /// `required_zeros` leading zero hex digits, starting from
    /// `block.nonce`.
    pub async fn prove(&self, mut block: Keyblock, required_zeros: u32) -> PowOutcome<Keyblock> {
        self.cancel_requested.store(false, Ordering::SeqCst);
        *self.state.lock().unwrap() = PowState::Searching;

        let mut nonce = block.nonce;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 {
                tokio::task::yield_now().await;
                if self.cancel_requested.load(Ordering::SeqCst) {
                    *self.state.lock().unwrap() = PowState::Idle;
                    self.cancel_ack.notify_one();
                    return PowOutcome::Cancelled;
                }
            }

            block.nonce = nonce;
            block.hash = block.compute_hash();
            if Keyblock::leading_zero_hex_digits(&block.hash) >= required_zeros {
                *self.state.lock().unwrap() = PowState::Idle;
                return PowOutcome::Found(block);
            }

            nonce = nonce.wrapping_add(1);
        }
    }

    /// Request cancellation of an in-flight `prove` call and wait for its
    /// acknowledgement. A no-op if the engine is already idle.
    pub async fn cancel(&self) {
        if self.state() == PowState::Idle {
            return;
        }
        *self.state.lock().unwrap() = PowState::Cancelling;
        self.cancel_requested.store(true, Ordering::SeqCst);
        self.cancel_ack.notified().await;
    }
}
