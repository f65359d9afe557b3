//! Transaction coordination for RepCRec
//!
//! The [`TransactionManager`] consumes one [`Command`] at a time, routes
//! reads and writes to sites through the placement directory, maintains
//! locks and the wait-for graph, parks operations that cannot proceed,
//! and decides commit or abort at each transaction's end. Its outputs are
//! a human-readable transcript and the ordered commit/abort
//! [`OutcomeLog`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod command;
pub mod coordinator;
pub mod parked;
pub mod report;

pub use command::Command;
pub use coordinator::TransactionManager;
pub use parked::Condition;
pub use report::{LogEntry, Outcome, OutcomeLog};

pub use repcrec_concurrency::{Request, TransactionKind, TransactionState};
