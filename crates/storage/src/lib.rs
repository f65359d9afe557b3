//! Per-site storage for RepCRec
//!
//! A [`Site`] is one storage replica: a file-backed committed store, a
//! per-variable lock table, the recovery state machine (including which
//! replicated copies are stale after a recovery), per-transaction staged
//! writes, and the history of up-intervals consulted by commit
//! eligibility and read-only validity checks.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod durable;
pub mod lock_table;
pub mod site;

pub use durable::DurableStore;
pub use lock_table::{Blockers, Grant, LockReply, LockTable};
pub use site::{ReadLockReply, Site, SiteStatus, WriteLockReply};
