//! Concurrency layer for RepCRec
//!
//! This crate implements the transaction-side state the coordinator
//! drives:
//! - [`Transaction`]: lifecycle state machine, access tracking,
//!   read-your-writes buffer, deferred-operation queue
//! - [`WaitForGraph`] and the wait-die policy
//! - [`MultiversionStore`]: committed version history consulted by
//!   read-only transactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod transaction;
pub mod versions;
pub mod wait_graph;

pub use transaction::{Request, Transaction, TransactionKind, TransactionState};
pub use versions::{MultiversionStore, Version};
pub use wait_graph::{wait_die, WaitDecision, WaitForGraph};
