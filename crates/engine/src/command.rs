//! The command stream surface.
//!
//! One [`Command`] per record in the input stream; the parser lives in
//! the CLI crate, the coordinator consumes these directly.

use repcrec_core::{SiteId, TransactionId, VariableId};

/// One command from the input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start a read-write transaction.
    Begin(TransactionId),
    /// Start a read-only transaction.
    BeginRo(TransactionId),
    /// Read a variable under a transaction.
    Read {
        /// Reading transaction.
        txn: TransactionId,
        /// Variable to read.
        var: VariableId,
    },
    /// Write a value to a variable under a transaction.
    Write {
        /// Writing transaction.
        txn: TransactionId,
        /// Variable to write.
        var: VariableId,
        /// Value to install at commit.
        value: i64,
    },
    /// Finalize a transaction (commit or abort per the rules).
    End(TransactionId),
    /// Take a site down.
    Fail(SiteId),
    /// Bring a site back up (replicated copies stale until written).
    Recover(SiteId),
    /// Emit the committed state of every site.
    Dump,
    /// Emit the committed value of one variable per hosting site.
    DumpVariable(VariableId),
    /// Emit the committed state of one site.
    DumpSite(SiteId),
}
