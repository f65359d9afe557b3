//! Core types for the RepCRec database
//!
//! Identifier newtypes, the logical clock, the static data-placement
//! directory, and the error taxonomy shared by every other crate in the
//! workspace.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod placement;
pub mod types;

pub use error::{AbortReason, Error, Result};
pub use placement::{Placement, ReplicaSet};
pub use types::{Clock, LockMode, SiteId, Tick, TransactionId, VariableId};
