//! Per-variable lock state for one site.
//!
//! Shared locks are mutually compatible; at most one exclusive holder per
//! variable. A conflicting request is answered with the blocking
//! transactions and is *not* queued — the coordinator runs wait-die first
//! and queues only survivors. Wake-up after a release is greedy: a write
//! at the head of the queue is granted when the variable is free (or the
//! head is the sole shared holder, which upgrades); contiguous reads at
//! the head are granted together.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use repcrec_core::{LockMode, TransactionId, VariableId};

/// Transactions standing between a request and its grant.
pub type Blockers = SmallVec<[TransactionId; 4]>;

/// Outcome of a lock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockReply {
    /// The requester holds the lock on return.
    Granted,
    /// Conflict. The request was not queued; the blockers are the current
    /// holders plus queued requests ahead of the requester.
    Wait(Blockers),
}

/// A grant issued while draining a waiter queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// Transaction now holding the lock.
    pub txn: TransactionId,
    /// Variable the lock covers.
    pub var: VariableId,
    /// Granted mode.
    pub mode: LockMode,
}

#[derive(Debug, Default)]
struct LockState {
    shared: SmallVec<[TransactionId; 4]>,
    exclusive: Option<TransactionId>,
    queue: VecDeque<(TransactionId, LockMode)>,
}

impl LockState {
    fn is_free(&self) -> bool {
        self.shared.is_empty() && self.exclusive.is_none()
    }

    fn holds(&self, txn: TransactionId) -> bool {
        self.exclusive == Some(txn) || self.shared.contains(&txn)
    }

    fn sole_shared_holder(&self, txn: TransactionId) -> bool {
        self.exclusive.is_none() && self.shared.len() == 1 && self.shared[0] == txn
    }

    fn is_empty(&self) -> bool {
        self.is_free() && self.queue.is_empty()
    }
}

/// Lock table for one site.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: FxHashMap<VariableId, LockState>,
}

impl LockTable {
    /// Try to take `mode` on `var` for `txn`. Never queues.
    pub fn try_acquire(&mut self, txn: TransactionId, var: VariableId, mode: LockMode) -> LockReply {
        let state = self.locks.entry(var).or_default();
        match mode {
            LockMode::Shared => {
                if state.holds(txn) {
                    return LockReply::Granted;
                }
                if let Some(holder) = state.exclusive {
                    return LockReply::Wait(Blockers::from_slice(&[holder]));
                }
                state.shared.push(txn);
                state.queue.retain(|&(t, m)| !(t == txn && m == LockMode::Shared));
                trace!(txn = %txn, var = %var, "read lock granted");
                LockReply::Granted
            }
            LockMode::Exclusive => {
                if state.exclusive == Some(txn) {
                    return LockReply::Granted;
                }
                if (state.is_free() || state.sole_shared_holder(txn)) && state.queue.is_empty() {
                    state.shared.clear();
                    state.exclusive = Some(txn);
                    trace!(txn = %txn, var = %var, "write lock granted");
                    return LockReply::Granted;
                }
                let mut blockers = Blockers::new();
                for holder in &state.shared {
                    if *holder != txn {
                        blockers.push(*holder);
                    }
                }
                if let Some(holder) = state.exclusive {
                    blockers.push(holder);
                }
                for &(queued, _) in &state.queue {
                    if queued == txn {
                        break;
                    }
                    if !blockers.contains(&queued) {
                        blockers.push(queued);
                    }
                }
                LockReply::Wait(blockers)
            }
        }
    }

    /// Queue a request behind the current holders. Idempotent.
    pub fn enqueue(&mut self, txn: TransactionId, var: VariableId, mode: LockMode) {
        let state = self.locks.entry(var).or_default();
        if !state.queue.iter().any(|&(t, m)| t == txn && m == mode) {
            state.queue.push_back((txn, mode));
        }
    }

    /// True iff `txn` holds any lock on `var`.
    pub fn holds(&self, txn: TransactionId, var: VariableId) -> bool {
        self.locks.get(&var).is_some_and(|s| s.holds(txn))
    }

    /// True iff `txn` has a queued request on `var`.
    pub fn is_queued(&self, txn: TransactionId, var: VariableId) -> bool {
        self.locks
            .get(&var)
            .is_some_and(|s| s.queue.iter().any(|&(t, _)| t == txn))
    }

    /// Drop every lock and queued request `txn` has, returning the
    /// variables whose state changed (wake-up candidates), ascending.
    pub fn release_all(&mut self, txn: TransactionId) -> Vec<VariableId> {
        let mut touched = Vec::new();
        for (var, state) in self.locks.iter_mut() {
            let held = state.holds(txn);
            let queued_before = state.queue.len();
            state.shared.retain(|t| *t != txn);
            if state.exclusive == Some(txn) {
                state.exclusive = None;
            }
            state.queue.retain(|&(t, _)| t != txn);
            if held || state.queue.len() != queued_before {
                touched.push(*var);
            }
        }
        self.locks.retain(|_, s| !s.is_empty());
        touched.sort();
        touched
    }

    /// Drain grants for `var` per the wake-up discipline.
    pub fn wake(&mut self, var: VariableId) -> SmallVec<[Grant; 2]> {
        let mut grants = SmallVec::new();
        let Some(state) = self.locks.get_mut(&var) else {
            return grants;
        };
        loop {
            match state.queue.front().copied() {
                Some((txn, LockMode::Exclusive)) => {
                    if state.is_free() || state.sole_shared_holder(txn) {
                        state.shared.clear();
                        state.exclusive = Some(txn);
                        state.queue.pop_front();
                        grants.push(Grant {
                            txn,
                            var,
                            mode: LockMode::Exclusive,
                        });
                    } else {
                        break;
                    }
                }
                Some((txn, LockMode::Shared)) => {
                    if state.exclusive.is_none() {
                        if !state.shared.contains(&txn) {
                            state.shared.push(txn);
                        }
                        state.queue.pop_front();
                        grants.push(Grant {
                            txn,
                            var,
                            mode: LockMode::Shared,
                        });
                    } else {
                        break;
                    }
                }
                None => break,
            }
        }
        grants
    }

    /// Drop all lock state (site failure).
    pub fn clear(&mut self) {
        self.locks.clear();
    }

    /// True iff no locks are held and no requests are queued.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
