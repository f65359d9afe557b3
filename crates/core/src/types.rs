//! Identifier newtypes and the logical clock.
//!
//! Everything in the system refers to sites, variables, and transactions by
//! small copyable ids; the coordinator owns the actual values and all
//! cross-references are resolved through id-keyed maps. Time is a logical
//! tick advanced once per processed command (and once more per commit).

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::Error;

/// A storage site identifier (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SiteId(u32);

impl SiteId {
    /// Create a site id. Ids are 1-based; zero is rejected at parse time,
    /// not here.
    pub fn new(index: u32) -> Self {
        SiteId(index)
    }

    /// The numeric index (1-based).
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SiteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let n: u32 = s
            .trim()
            .parse()
            .map_err(|_| Error::Input(format!("invalid site id '{}'", s)))?;
        if n == 0 {
            return Err(Error::Input("site ids start at 1".to_string()));
        }
        Ok(SiteId(n))
    }
}

/// A variable identifier: `x1 … xN` in the script surface (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VariableId(u32);

impl VariableId {
    /// Create a variable id from its 1-based index.
    pub fn new(index: u32) -> Self {
        VariableId(index)
    }

    /// The numeric index (1-based).
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl FromStr for VariableId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        let digits = s
            .strip_prefix('x')
            .ok_or_else(|| Error::Input(format!("invalid variable '{}', expected x<n>", s)))?;
        let n: u32 = digits
            .parse()
            .map_err(|_| Error::Input(format!("invalid variable '{}'", s)))?;
        if n == 0 {
            return Err(Error::Input("variable ids start at x1".to_string()));
        }
        Ok(VariableId(n))
    }
}

/// A transaction identifier: `T1, T2, …` in the script surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TransactionId(u32);

impl TransactionId {
    /// Create a transaction id from its numeric part.
    pub fn new(index: u32) -> Self {
        TransactionId(index)
    }

    /// The numeric part of the id.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let s = s.trim();
        let digits = s
            .strip_prefix('T')
            .ok_or_else(|| Error::Input(format!("invalid transaction '{}', expected T<n>", s)))?;
        let n: u32 = digits
            .parse()
            .map_err(|_| Error::Input(format!("invalid transaction '{}'", s)))?;
        Ok(TransactionId(n))
    }
}

/// A logical instant. Ticks are totally ordered and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
pub struct Tick(u64);

impl Tick {
    /// The instant before the first command; initial state is stamped here.
    pub const ZERO: Tick = Tick(0);

    /// Raw counter value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The coordinator's monotonic clock.
///
/// Advanced once per command, and once more for every commit so that
/// commit timestamps are unique even when a commit cascades inside another
/// command's processing.
#[derive(Debug, Default)]
pub struct Clock {
    now: Tick,
}

impl Clock {
    /// A clock at [`Tick::ZERO`].
    pub fn new() -> Self {
        Clock { now: Tick::ZERO }
    }

    /// The current instant.
    pub fn now(&self) -> Tick {
        self.now
    }

    /// Move to the next instant and return it.
    pub fn advance(&mut self) -> Tick {
        self.now = Tick(self.now.0 + 1);
        self.now
    }
}

/// Lock compatibility class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Read lock; mutually compatible.
    Shared,
    /// Write lock; conflicts with everything.
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "read"),
            LockMode::Exclusive => write!(f, "write"),
        }
    }
}
