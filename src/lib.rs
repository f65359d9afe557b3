//! # RepCRec
//!
//! A teaching-grade replicated database demonstrating concurrency control
//! and recovery: strict two-phase locking with wait-die deadlock
//! avoidance for read-write transactions, multiversion snapshot reads for
//! read-only transactions, and a site failure/recovery model in which
//! replicated copies stay stale until the first post-recovery committed
//! write.
//!
//! # Quick Start
//!
//! ```no_run
//! use repcrec::{Command, Placement, TransactionId, TransactionManager, VariableId};
//!
//! fn main() -> repcrec::Result<()> {
//!     let mut db = TransactionManager::new(Placement::default(), "./data".as_ref())?;
//!
//!     let t1 = TransactionId::new(1);
//!     db.execute(Command::Begin(t1))?;
//!     db.execute(Command::Write { txn: t1, var: VariableId::new(2), value: 42 })?;
//!     db.execute(Command::End(t1))?;
//!
//!     for line in db.take_output() {
//!         println!("{}", line);
//!     }
//!     assert!(db.outcome_log().outcome_of(t1).is_some());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The [`TransactionManager`] is the entry point: a single-threaded
//! coordinator consuming one [`Command`] at a time. Sites, locks, the
//! wait-for graph, and the multiversion history live behind it in the
//! internal crates; only the surface re-exported here is stable.

pub use repcrec_core::{
    AbortReason, Error, Placement, Result, SiteId, Tick, TransactionId, VariableId,
};

pub use repcrec_concurrency::{TransactionKind, TransactionState};

pub use repcrec_engine::{Command, LogEntry, Outcome, OutcomeLog, TransactionManager};
