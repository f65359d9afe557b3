//! File-backed committed state for one site.
//!
//! One file per variable under the site's directory, holding the latest
//! committed integer as text. An install writes a temp file and renames it
//! over the final path, so a variable never holds a torn value. A cache
//! map in front serves reads; the files are the durable record.

use std::fs;
use std::path::PathBuf;

use rustc_hash::FxHashMap;

use repcrec_core::{Result, VariableId};

/// Durable map from variable id to committed integer value.
#[derive(Debug)]
pub struct DurableStore {
    dir: PathBuf,
    cache: FxHashMap<VariableId, i64>,
}

impl DurableStore {
    /// Create the backing directory (and any missing parents) and an
    /// empty store.
    pub fn create(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(DurableStore {
            dir,
            cache: FxHashMap::default(),
        })
    }

    fn path_for(&self, var: VariableId) -> PathBuf {
        self.dir.join(format!("x{}", var.index()))
    }

    /// Install a committed value, atomically per variable.
    pub fn install(&mut self, var: VariableId, value: i64) -> Result<()> {
        let tmp = self.dir.join(format!("x{}.tmp", var.index()));
        fs::write(&tmp, format!("{}\n", value))?;
        fs::rename(&tmp, self.path_for(var))?;
        self.cache.insert(var, value);
        Ok(())
    }

    /// Latest committed value, if the variable is hosted here.
    pub fn get(&self, var: VariableId) -> Option<i64> {
        self.cache.get(&var).copied()
    }

    /// Hosted variables, ascending.
    pub fn variables(&self) -> Vec<VariableId> {
        let mut vars: Vec<_> = self.cache.keys().copied().collect();
        vars.sort();
        vars
    }
}
