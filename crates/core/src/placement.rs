//! Static data placement.
//!
//! Odd-indexed variables live at exactly one site, `1 + (i mod S)`;
//! even-indexed variables are replicated at every site. Each variable's
//! initial value is ten times its index, installed at every hosting site.
//! The layout is fixed for the life of the process.

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::types::{SiteId, VariableId};

/// Replica list for one variable, ascending by site id.
pub type ReplicaSet = SmallVec<[SiteId; 10]>;

/// The site directory: which sites hold which variables.
#[derive(Debug, Clone)]
pub struct Placement {
    sites: u32,
    variables: u32,
}

impl Placement {
    /// Site count of the reference configuration.
    pub const DEFAULT_SITES: u32 = 10;
    /// Variable count of the reference configuration.
    pub const DEFAULT_VARIABLES: u32 = 20;

    /// Build a placement over `sites` sites and `variables` variables.
    pub fn new(sites: u32, variables: u32) -> Result<Self> {
        if sites == 0 {
            return Err(Error::Config("site count must be at least 1".to_string()));
        }
        if variables == 0 {
            return Err(Error::Config(
                "variable count must be at least 1".to_string(),
            ));
        }
        Ok(Placement { sites, variables })
    }

    /// Number of sites.
    pub fn site_count(&self) -> u32 {
        self.sites
    }

    /// Number of variables.
    pub fn variable_count(&self) -> u32 {
        self.variables
    }

    /// All site ids, ascending.
    pub fn site_ids(&self) -> impl Iterator<Item = SiteId> {
        (1..=self.sites).map(SiteId::new)
    }

    /// All variable ids, ascending.
    pub fn variable_ids(&self) -> impl Iterator<Item = VariableId> {
        (1..=self.variables).map(VariableId::new)
    }

    /// True iff the site id is within this layout.
    pub fn contains_site(&self, site: SiteId) -> bool {
        (1..=self.sites).contains(&site.index())
    }

    /// True iff the variable id is within this layout.
    pub fn contains_variable(&self, var: VariableId) -> bool {
        (1..=self.variables).contains(&var.index())
    }

    /// Even-indexed variables are held at every site.
    pub fn is_replicated(&self, var: VariableId) -> bool {
        var.index() % 2 == 0
    }

    /// The single site holding a non-replicated variable.
    pub fn home_site(&self, var: VariableId) -> SiteId {
        debug_assert!(!self.is_replicated(var));
        SiteId::new(1 + var.index() % self.sites)
    }

    /// Sites holding `var`, ascending by id.
    pub fn sites_for(&self, var: VariableId) -> ReplicaSet {
        if self.is_replicated(var) {
            self.site_ids().collect()
        } else {
            let mut replicas = ReplicaSet::new();
            replicas.push(self.home_site(var));
            replicas
        }
    }

    /// True iff `site` holds a copy of `var`.
    pub fn hosts(&self, site: SiteId, var: VariableId) -> bool {
        self.is_replicated(var) || self.home_site(var) == site
    }

    /// Variables hosted at `site`, ascending.
    pub fn variables_at(&self, site: SiteId) -> impl Iterator<Item = VariableId> + '_ {
        self.variable_ids().filter(move |v| self.hosts(site, *v))
    }

    /// The default value installed for `var` before any commit.
    pub fn initial_value(&self, var: VariableId) -> i64 {
        10 * i64::from(var.index())
    }
}

impl Default for Placement {
    fn default() -> Self {
        Placement {
            sites: Self::DEFAULT_SITES,
            variables: Self::DEFAULT_VARIABLES,
        }
    }
}
