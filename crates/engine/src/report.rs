//! The commit/abort log.
//!
//! An ordered record of transaction outcomes, retrievable at any time.
//! The assertion harness reads it after the run; `--summary-json` emits
//! it through the serde derives.

use serde::Serialize;

use repcrec_core::{AbortReason, TransactionId};

/// Terminal outcome of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// Committed at end.
    Committed,
    /// Aborted, with the reason.
    Aborted(AbortReason),
}

impl Outcome {
    /// True iff committed.
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed)
    }
}

/// One outcome-log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// The transaction.
    pub txn: TransactionId,
    /// How it ended.
    pub outcome: Outcome,
}

/// Ordered record of transaction outcomes.
#[derive(Debug, Default, Serialize)]
pub struct OutcomeLog {
    entries: Vec<LogEntry>,
}

impl OutcomeLog {
    /// Append one outcome. Each transaction ends exactly once.
    pub fn record(&mut self, txn: TransactionId, outcome: Outcome) {
        debug_assert!(
            self.outcome_of(txn).is_none(),
            "{} finished twice",
            txn
        );
        self.entries.push(LogEntry { txn, outcome });
    }

    /// The outcome of `txn`, if it has finished.
    pub fn outcome_of(&self, txn: TransactionId) -> Option<Outcome> {
        self.entries
            .iter()
            .find(|e| e.txn == txn)
            .map(|e| e.outcome)
    }

    /// All entries, in finish order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// True iff no transaction has finished.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of finished transactions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
