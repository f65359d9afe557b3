//! Parked operations and their wake conditions.
//!
//! A transaction whose head operation cannot run because of site
//! availability (rather than a lock conflict) parks here; the operation
//! itself stays at the head of the transaction's deferred queue.
//! Conditions fire with any-of semantics: one firing makes the operation
//! ready to re-drive, and a re-drive that still cannot proceed re-parks
//! with fresh conditions.

use smallvec::SmallVec;

use repcrec_core::{SiteId, TransactionId, VariableId};

/// An event a parked operation is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    /// The site came back up.
    SiteUp(SiteId),
    /// A write to the variable committed somewhere, clearing staleness on
    /// the installing sites.
    WriteCommitted(VariableId),
}

#[derive(Debug)]
struct Entry {
    txn: TransactionId,
    seq: u64,
    conditions: SmallVec<[Condition; 4]>,
}

/// Index of parked operations by transaction.
#[derive(Debug, Default)]
pub struct ParkedOps {
    entries: Vec<Entry>,
}

impl ParkedOps {
    /// Park `txn`'s head operation under `conditions`, replacing any
    /// previous entry for the same transaction.
    pub fn park(
        &mut self,
        txn: TransactionId,
        seq: u64,
        conditions: SmallVec<[Condition; 4]>,
    ) {
        self.entries.retain(|e| e.txn != txn);
        self.entries.push(Entry {
            txn,
            seq,
            conditions,
        });
    }

    /// Fire a condition: remove and return every transaction waiting on
    /// it, ordered by blocking sequence.
    pub fn fire(&mut self, condition: Condition) -> Vec<(u64, TransactionId)> {
        let mut ready: Vec<(u64, TransactionId)> = self
            .entries
            .iter()
            .filter(|e| e.conditions.contains(&condition))
            .map(|e| (e.seq, e.txn))
            .collect();
        self.entries.retain(|e| !e.conditions.contains(&condition));
        ready.sort();
        ready
    }

    /// Drop `txn`'s parked entry (it aborted or resumed another way).
    pub fn remove(&mut self, txn: TransactionId) {
        self.entries.retain(|e| e.txn != txn);
    }

    /// True iff `txn` has a parked operation.
    pub fn contains(&self, txn: TransactionId) -> bool {
        self.entries.iter().any(|e| e.txn == txn)
    }

    /// True iff nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
