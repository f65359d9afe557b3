//! Error taxonomy for the RepCRec workspace.
//!
//! Fatal problems — malformed input, bad configuration, I/O failures in
//! the durable store — are [`Error`] values that terminate the run.
//! Operational transaction aborts are *events*, not errors: the
//! coordinator records an [`AbortReason`] in its outcome log and keeps
//! consuming commands.

use std::fmt;
use std::io;

use serde::Serialize;
use thiserror::Error;

/// Result type alias for RepCRec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors that abort the run.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure in the durable store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed command, or a command referencing impossible state
    /// (unknown transaction, duplicate begin, write by a read-only
    /// transaction).
    #[error("invalid input: {0}")]
    Input(String),

    /// Invalid site/variable count, or a data directory that already
    /// exists.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure serializing the run summary.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Why a transaction was aborted.
///
/// Carried by the outcome log; never propagated as an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AbortReason {
    /// Lost a wait-die conflict: the transaction was younger than a lock
    /// holder it would have waited for.
    WaitDie,
    /// A site the transaction had accessed failed before its end.
    SiteDownDuringAccess,
    /// A read-only transaction found no replica that stayed up from the
    /// version's commit through the transaction's start.
    ReadOnlyUnavailableHistory,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::WaitDie => write!(f, "wait-die"),
            AbortReason::SiteDownDuringAccess => write!(f, "site failed during access"),
            AbortReason::ReadOnlyUnavailableHistory => {
                write!(f, "no continuously available copy")
            }
        }
    }
}
