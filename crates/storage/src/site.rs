//! A single storage replica.
//!
//! Owns the durable committed store, the lock table, the up/down state
//! with its interval history, the set of stale replicated copies after a
//! recovery, and the per-transaction staged write buffers. All mutation
//! goes through the narrow method surface the coordinator calls.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use repcrec_core::{LockMode, Placement, Result, SiteId, Tick, TransactionId, VariableId};

use crate::durable::DurableStore;
use crate::lock_table::{Blockers, Grant, LockReply, LockTable};

/// Site availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    /// Accepting operations.
    Up,
    /// Failed; accepting nothing until `recover`.
    Down,
}

/// Answer to a read-lock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLockReply {
    /// Lock held by the requester on return.
    Granted,
    /// Conflict with the listed transactions; nothing was queued.
    Wait(Blockers),
    /// The copy here is stale since recovery; try another replica.
    Stale,
    /// The site is down.
    Down,
}

/// Answer to a write-lock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteLockReply {
    /// Lock held by the requester on return.
    Granted,
    /// Conflict with the listed transactions; nothing was queued.
    Wait(Blockers),
    /// The site is down.
    Down,
}

#[derive(Debug, Clone, Copy)]
struct UpInterval {
    from: Tick,
    to: Option<Tick>,
}

/// One storage replica.
#[derive(Debug)]
pub struct Site {
    id: SiteId,
    status: SiteStatus,
    store: DurableStore,
    locks: LockTable,
    /// Replicated variables hosted here; the stale set resets to this on
    /// recovery.
    replicated: FxHashSet<VariableId>,
    /// Replicated copies unreadable until overwritten by a commit.
    stale: FxHashSet<VariableId>,
    /// Staged writes per transaction, installed at commit.
    staged: FxHashMap<TransactionId, FxHashMap<VariableId, i64>>,
    up_intervals: Vec<UpInterval>,
}

impl Site {
    /// Create the site under `data_dir/site_<id>` and seed every hosted
    /// variable with its default value.
    pub fn create(id: SiteId, data_dir: &Path, placement: &Placement) -> Result<Self> {
        let mut store = DurableStore::create(data_dir.join(format!("site_{}", id.index())))?;
        let mut replicated = FxHashSet::default();
        for var in placement.variables_at(id) {
            store.install(var, placement.initial_value(var))?;
            if placement.is_replicated(var) {
                replicated.insert(var);
            }
        }
        Ok(Site {
            id,
            status: SiteStatus::Up,
            store,
            locks: LockTable::default(),
            replicated,
            stale: FxHashSet::default(),
            staged: FxHashMap::default(),
            up_intervals: vec![UpInterval {
                from: Tick::ZERO,
                to: None,
            }],
        })
    }

    /// This site's id.
    pub fn id(&self) -> SiteId {
        self.id
    }

    /// Current availability.
    pub fn status(&self) -> SiteStatus {
        self.status
    }

    /// True iff the site is up.
    pub fn is_up(&self) -> bool {
        self.status == SiteStatus::Up
    }

    /// Start tick of the current up-interval, if up.
    pub fn up_since(&self) -> Option<Tick> {
        if self.is_up() {
            self.up_intervals.last().map(|iv| iv.from)
        } else {
            None
        }
    }

    /// True iff one recorded up-interval covers `[from, to]`.
    pub fn was_up_throughout(&self, from: Tick, to: Tick) -> bool {
        self.up_intervals
            .iter()
            .any(|iv| iv.from <= from && iv.to.map_or(true, |end| end >= to))
    }

    /// True iff the copy of `var` here is stale since the last recovery.
    pub fn is_stale(&self, var: VariableId) -> bool {
        self.stale.contains(&var)
    }

    /// Request a read lock (§ lock discipline: grants unless another
    /// transaction holds the write lock). Never queues.
    pub fn read_lock(&mut self, txn: TransactionId, var: VariableId) -> ReadLockReply {
        if !self.is_up() {
            return ReadLockReply::Down;
        }
        if self.stale.contains(&var) {
            return ReadLockReply::Stale;
        }
        match self.locks.try_acquire(txn, var, LockMode::Shared) {
            LockReply::Granted => ReadLockReply::Granted,
            LockReply::Wait(blockers) => ReadLockReply::Wait(blockers),
        }
    }

    /// Request a write lock. Stale state does not block acquisition;
    /// writing is what clears it. Never queues.
    pub fn write_lock(&mut self, txn: TransactionId, var: VariableId) -> WriteLockReply {
        if !self.is_up() {
            return WriteLockReply::Down;
        }
        match self.locks.try_acquire(txn, var, LockMode::Exclusive) {
            LockReply::Granted => WriteLockReply::Granted,
            LockReply::Wait(blockers) => WriteLockReply::Wait(blockers),
        }
    }

    /// Queue a lock request that survived wait-die.
    pub fn enqueue(&mut self, txn: TransactionId, var: VariableId, mode: LockMode) {
        self.locks.enqueue(txn, var, mode);
    }

    /// Committed value of `var`, from the durable store. Used after a
    /// read lock was granted, and by dumps (which read committed state
    /// regardless of availability).
    pub fn committed_value(&self, var: VariableId) -> Option<i64> {
        self.store.get(var)
    }

    /// Stage a write after the write lock was granted here.
    pub fn buffer_write(&mut self, txn: TransactionId, var: VariableId, value: i64) {
        debug_assert!(self.is_up());
        self.staged.entry(txn).or_default().insert(var, value);
    }

    /// `txn`'s staged value for `var`, if any.
    pub fn staged_value(&self, txn: TransactionId, var: VariableId) -> Option<i64> {
        self.staged.get(&txn).and_then(|w| w.get(&var)).copied()
    }

    /// Install `txn`'s staged writes into the durable store, clearing
    /// staleness for each written variable. Returns the installed pairs,
    /// ascending by variable. Locks are released separately.
    pub fn commit(&mut self, txn: TransactionId) -> Result<Vec<(VariableId, i64)>> {
        let Some(writes) = self.staged.remove(&txn) else {
            return Ok(Vec::new());
        };
        let mut installed: Vec<(VariableId, i64)> = writes.into_iter().collect();
        installed.sort_by_key(|(var, _)| *var);
        for (var, value) in &installed {
            self.store.install(*var, *value)?;
            self.stale.remove(var);
        }
        debug!(
            target: "repcrec::site",
            site = self.id.index(),
            txn = %txn,
            writes = installed.len(),
            "installed committed writes"
        );
        Ok(installed)
    }

    /// Release `txn`'s locks and queued requests, then wake waiters.
    pub fn release(&mut self, txn: TransactionId) -> Vec<Grant> {
        let touched = self.locks.release_all(txn);
        let mut grants = Vec::new();
        for var in touched {
            grants.extend(self.locks.wake(var));
        }
        grants
    }

    /// Discard `txn`'s staged writes, release its locks, wake waiters.
    pub fn abort(&mut self, txn: TransactionId) -> Vec<Grant> {
        self.staged.remove(&txn);
        self.release(txn)
    }

    /// `Up → Down`. Lock state and staged buffers vanish; the durable
    /// store survives.
    pub fn fail(&mut self, now: Tick) {
        debug_assert!(self.is_up());
        self.status = SiteStatus::Down;
        self.locks.clear();
        self.staged.clear();
        if let Some(last) = self.up_intervals.last_mut() {
            last.to = Some(now);
        }
        debug!(target: "repcrec::site", site = self.id.index(), at = %now, "site failed");
    }

    /// `Down → Up` with every replicated copy stale. Non-replicated
    /// variables are immediately available again.
    pub fn recover(&mut self, now: Tick) {
        debug_assert!(!self.is_up());
        self.status = SiteStatus::Up;
        self.up_intervals.push(UpInterval { from: now, to: None });
        self.stale = self.replicated.clone();
        debug!(target: "repcrec::site", site = self.id.index(), at = %now, "site recovered");
    }

    /// Hosted variables, ascending.
    pub fn variables(&self) -> Vec<VariableId> {
        self.store.variables()
    }

    /// True iff `txn` holds a lock on `var` here.
    pub fn holds_lock(&self, txn: TransactionId, var: VariableId) -> bool {
        self.locks.holds(txn, var)
    }

    /// True iff `txn` has a queued lock request on `var` here.
    pub fn has_queued(&self, txn: TransactionId, var: VariableId) -> bool {
        self.locks.is_queued(txn, var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn t(n: u32) -> TransactionId {
        TransactionId::new(n)
    }

    fn x(n: u32) -> VariableId {
        VariableId::new(n)
    }

    fn site_one(tmp: &TempDir) -> Site {
        Site::create(SiteId::new(1), tmp.path(), &Placement::default()).unwrap()
    }

    #[test]
    fn test_create_seeds_defaults() {
        let tmp = TempDir::new().unwrap();
        let site = site_one(&tmp);
        // Site 1 hosts every even variable in the reference layout.
        assert_eq!(site.committed_value(x(2)), Some(20));
        assert_eq!(site.committed_value(x(20)), Some(200));
        assert_eq!(site.committed_value(x(1)), None);
    }

    #[test]
    fn test_down_site_rejects_locks() {
        let tmp = TempDir::new().unwrap();
        let mut site = site_one(&tmp);
        let mut clock = repcrec_core::Clock::new();
        site.fail(clock.advance());
        assert_eq!(site.read_lock(t(1), x(2)), ReadLockReply::Down);
        assert_eq!(site.write_lock(t(1), x(2)), WriteLockReply::Down);
    }

    #[test]
    fn test_fail_clears_locks_and_staging_but_not_store() {
        let tmp = TempDir::new().unwrap();
        let mut site = site_one(&tmp);
        let mut clock = repcrec_core::Clock::new();
        assert_eq!(site.write_lock(t(1), x(4)), WriteLockReply::Granted);
        site.buffer_write(t(1), x(4), 99);
        site.fail(clock.advance());
        site.recover(clock.advance());
        assert!(!site.holds_lock(t(1), x(4)));
        assert_eq!(site.staged_value(t(1), x(4)), None);
        assert_eq!(site.committed_value(x(4)), Some(40));
    }

    #[test]
    fn test_recovery_stales_replicated_only() {
        let tmp = TempDir::new().unwrap();
        let mut site = Site::create(SiteId::new(2), tmp.path(), &Placement::default()).unwrap();
        let mut clock = repcrec_core::Clock::new();
        site.fail(clock.advance());
        site.recover(clock.advance());
        // x2 is replicated, x1's home is site 2 and is not replicated.
        assert!(site.is_stale(x(2)));
        assert!(!site.is_stale(x(1)));
        assert_eq!(site.read_lock(t(1), x(2)), ReadLockReply::Stale);
        assert_eq!(site.read_lock(t(1), x(1)), ReadLockReply::Granted);
    }

    #[test]
    fn test_write_lock_ignores_staleness_and_commit_clears_it() {
        let tmp = TempDir::new().unwrap();
        let mut site = site_one(&tmp);
        let mut clock = repcrec_core::Clock::new();
        site.fail(clock.advance());
        site.recover(clock.advance());
        assert!(site.is_stale(x(6)));
        assert_eq!(site.write_lock(t(1), x(6)), WriteLockReply::Granted);
        site.buffer_write(t(1), x(6), 66);
        let installed = site.commit(t(1)).unwrap();
        assert_eq!(installed, vec![(x(6), 66)]);
        assert!(!site.is_stale(x(6)));
        assert_eq!(site.committed_value(x(6)), Some(66));
        // Other replicated copies stay stale until written.
        assert!(site.is_stale(x(8)));
    }

    #[test]
    fn test_abort_discards_staged_writes() {
        let tmp = TempDir::new().unwrap();
        let mut site = site_one(&tmp);
        assert_eq!(site.write_lock(t(1), x(2)), WriteLockReply::Granted);
        site.buffer_write(t(1), x(2), 77);
        site.abort(t(1));
        assert_eq!(site.committed_value(x(2)), Some(20));
        assert!(!site.holds_lock(t(1), x(2)));
        assert_eq!(site.commit(t(1)).unwrap(), Vec::new());
    }

    #[test]
    fn test_release_wakes_queued_waiter() {
        let tmp = TempDir::new().unwrap();
        let mut site = site_one(&tmp);
        assert_eq!(site.write_lock(t(1), x(2)), WriteLockReply::Granted);
        assert!(matches!(site.read_lock(t(2), x(2)), ReadLockReply::Wait(_)));
        site.enqueue(t(2), x(2), LockMode::Shared);
        let grants = site.release(t(1));
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].txn, t(2));
        assert!(site.holds_lock(t(2), x(2)));
    }

    #[test]
    fn test_up_interval_history() {
        let tmp = TempDir::new().unwrap();
        let mut site = site_one(&tmp);
        let mut clock = repcrec_core::Clock::new();
        let t1 = clock.advance();
        let t2 = clock.advance();
        let t3 = clock.advance();
        site.fail(t3);
        let t4 = clock.advance();
        site.recover(t4);
        let t5 = clock.advance();
        assert!(site.was_up_throughout(t1, t2));
        assert!(site.was_up_throughout(Tick::ZERO, t3));
        assert!(!site.was_up_throughout(t2, t4));
        assert!(!site.was_up_throughout(t1, t5));
        assert!(site.was_up_throughout(t4, t5));
        assert_eq!(site.up_since(), Some(t4));
    }
}
