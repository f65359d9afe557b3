//! Transaction records and their lifecycle.
//!
//! State transitions:
//! - `Active` → `Blocked` (lock conflict or availability wait)
//! - `Blocked` → `Active` (all waits cleared; the head operation re-drives)
//! - `Active` → `Committed` (end, eligibility check passed)
//! - `Active`/`Blocked` → `Aborted` (wait-die, site failure at end,
//!   read-only history miss)
//!
//! Terminal states are final; transitions out of them are programmer
//! errors guarded by debug assertions, not runtime errors.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};

use repcrec_core::{SiteId, Tick, TransactionId, VariableId};

/// Read-write or read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Runs under strict two-phase locking.
    ReadWrite,
    /// Lock-free; reads a multiversion snapshot at its start time.
    ReadOnly,
}

/// Lifecycle state. `Committed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Executing; can accept operations.
    Active,
    /// Head operation is waiting on locks or availability.
    Blocked,
    /// Ended successfully.
    Committed,
    /// Ended by wait-die, a site failure, or a history miss.
    Aborted,
}

/// An operation a transaction asked for that may have to wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Read a variable.
    Read(VariableId),
    /// Write a value to a variable.
    Write(VariableId, i64),
    /// Finalize the transaction.
    End,
}

/// One transaction, owned by the coordinator and referenced by id
/// everywhere else.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    kind: TransactionKind,
    start_time: Tick,
    state: TransactionState,
    /// Tick of the first successful access per site; commit requires the
    /// site to have been up continuously since that tick.
    first_access: FxHashMap<SiteId, Tick>,
    /// Values written so far; answers read-your-writes.
    written: FxHashMap<VariableId, i64>,
    /// Outstanding lock waits as (site, variable).
    lock_waits: FxHashSet<(SiteId, VariableId)>,
    /// The blocked head operation and everything queued behind it,
    /// including a parked `end`. FIFO.
    deferred: VecDeque<Request>,
    /// Global order in which this transaction last blocked; ties resume
    /// scheduling to original parking order.
    blocked_seq: u64,
}

impl Transaction {
    /// A fresh `Active` transaction.
    pub fn new(id: TransactionId, kind: TransactionKind, start_time: Tick) -> Self {
        Transaction {
            id,
            kind,
            start_time,
            state: TransactionState::Active,
            first_access: FxHashMap::default(),
            written: FxHashMap::default(),
            lock_waits: FxHashSet::default(),
            deferred: VecDeque::new(),
            blocked_seq: 0,
        }
    }

    /// This transaction's id.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Read-write or read-only.
    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    /// True iff read-only.
    pub fn is_read_only(&self) -> bool {
        self.kind == TransactionKind::ReadOnly
    }

    /// Tick assigned at begin; also the snapshot time for read-only
    /// transactions.
    pub fn start_time(&self) -> Tick {
        self.start_time
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// True iff `Active`.
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// True iff `Blocked`.
    pub fn is_blocked(&self) -> bool {
        self.state == TransactionState::Blocked
    }

    /// True iff in a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            TransactionState::Committed | TransactionState::Aborted
        )
    }

    // === Access tracking ===

    /// Note a successful read or buffered write at `site`. Only the first
    /// access per site is kept.
    pub fn record_access(&mut self, site: SiteId, now: Tick) {
        self.first_access.entry(site).or_insert(now);
    }

    /// Sites accessed, with the tick of the first access there.
    pub fn accessed_sites(&self) -> impl Iterator<Item = (SiteId, Tick)> + '_ {
        self.first_access.iter().map(|(s, t)| (*s, *t))
    }

    // === Read-your-writes ===

    /// Remember a buffered write; later reads of `var` see it.
    pub fn note_write(&mut self, var: VariableId, value: i64) {
        self.written.insert(var, value);
    }

    /// The transaction's own buffered value for `var`, if any.
    pub fn own_write(&self, var: VariableId) -> Option<i64> {
        self.written.get(&var).copied()
    }

    // === Lock waits ===

    /// Record an outstanding lock wait.
    pub fn add_lock_wait(&mut self, site: SiteId, var: VariableId) {
        self.lock_waits.insert((site, var));
    }

    /// Clear one outstanding lock wait (the lock was granted or the site
    /// failed).
    pub fn clear_lock_wait(&mut self, site: SiteId, var: VariableId) {
        self.lock_waits.remove(&(site, var));
    }

    /// Drop every wait recorded against `site`.
    pub fn clear_lock_waits_at(&mut self, site: SiteId) {
        self.lock_waits.retain(|(s, _)| *s != site);
    }

    /// True iff any lock wait is outstanding.
    pub fn has_lock_waits(&self) -> bool {
        !self.lock_waits.is_empty()
    }

    /// True iff a wait is recorded against `site`.
    pub fn waits_at(&self, site: SiteId) -> bool {
        self.lock_waits.iter().any(|(s, _)| *s == site)
    }

    // === Deferred operations ===

    /// Queue an operation behind the blocked head.
    pub fn push_request(&mut self, request: Request) {
        self.deferred.push_back(request);
    }

    /// The operation that must run next, if any.
    pub fn front_request(&self) -> Option<Request> {
        self.deferred.front().copied()
    }

    /// Drop the head operation after it completed.
    pub fn pop_request(&mut self) -> Option<Request> {
        self.deferred.pop_front()
    }

    /// True iff operations are queued.
    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    // === State transitions ===

    /// `Active → Blocked`, stamped with the global blocking sequence
    /// number used for fair resume ordering.
    pub fn block(&mut self, seq: u64) {
        debug_assert!(self.is_active(), "{} blocked from {:?}", self.id, self.state);
        self.state = TransactionState::Blocked;
        self.blocked_seq = seq;
    }

    /// Sequence number of the last blocking event.
    pub fn blocked_seq(&self) -> u64 {
        self.blocked_seq
    }

    /// `Blocked → Active`.
    pub fn unblock(&mut self) {
        debug_assert!(self.is_blocked(), "{} resumed from {:?}", self.id, self.state);
        self.state = TransactionState::Active;
    }

    /// `Active → Committed`.
    pub fn mark_committed(&mut self) {
        debug_assert!(self.is_active(), "{} committed from {:?}", self.id, self.state);
        self.state = TransactionState::Committed;
    }

    /// `Active | Blocked → Aborted`. Buffered writes, waits, and deferred
    /// operations are dropped.
    pub fn mark_aborted(&mut self) {
        debug_assert!(!self.is_finished(), "{} aborted twice", self.id);
        self.state = TransactionState::Aborted;
        self.written.clear();
        self.lock_waits.clear();
        self.deferred.clear();
    }
}
