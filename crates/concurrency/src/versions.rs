//! Committed version history for read-only transactions.
//!
//! Per-variable chains of `(commit tick, value, installed sites)`, stored
//! newest-first, seeded with the initial defaults at tick zero. The
//! snapshot at time `t` is the map from each variable to its latest
//! version at or before `t`; read-only transactions read exactly that,
//! and the installed-site sets make the "continuously up on some
//! replica" validity predicate decidable.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use repcrec_core::{Placement, SiteId, Tick, VariableId};

/// One committed version of a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Commit tick of the writing transaction (zero for the seed value).
    pub commit_time: Tick,
    /// The committed value.
    pub value: i64,
    /// Sites where this version was installed at commit time, ascending.
    pub sites: SmallVec<[SiteId; 10]>,
}

/// Append-only committed version history, per variable.
#[derive(Debug, Default)]
pub struct MultiversionStore {
    /// Newest-first version chains.
    chains: FxHashMap<VariableId, VecDeque<Version>>,
}

impl MultiversionStore {
    /// A store seeded with every variable's default value at tick zero,
    /// installed at all of its hosting sites.
    pub fn seeded(placement: &Placement) -> Self {
        let mut store = MultiversionStore::default();
        for var in placement.variable_ids() {
            store.record(
                var,
                Tick::ZERO,
                placement.initial_value(var),
                placement.sites_for(var).into_iter().collect(),
            );
        }
        store
    }

    /// Record one committed write. Commit times must arrive in ascending
    /// order.
    pub fn record(
        &mut self,
        var: VariableId,
        commit_time: Tick,
        value: i64,
        sites: SmallVec<[SiteId; 10]>,
    ) {
        let chain = self.chains.entry(var).or_default();
        debug_assert!(
            chain.front().map_or(true, |v| v.commit_time < commit_time),
            "commit times must be monotonic per variable"
        );
        chain.push_front(Version {
            commit_time,
            value,
            sites,
        });
    }

    /// Latest version of `var` at or before `t`.
    pub fn version_at(&self, var: VariableId, t: Tick) -> Option<&Version> {
        self.chains
            .get(&var)?
            .iter()
            .find(|v| v.commit_time <= t)
    }

    /// The most recently committed version of `var`.
    pub fn latest(&self, var: VariableId) -> Option<&Version> {
        self.chains.get(&var)?.front()
    }

    /// Number of recorded versions of `var`, including the seed.
    pub fn version_count(&self, var: VariableId) -> usize {
        self.chains.get(&var).map_or(0, |c| c.len())
    }

    /// Every recorded version of `var`, oldest first.
    pub fn history(&self, var: VariableId) -> impl Iterator<Item = &Version> {
        self.chains.get(&var).into_iter().flat_map(|c| c.iter().rev())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn x(n: u32) -> VariableId {
        VariableId::new(n)
    }

    fn s(n: u32) -> SiteId {
        SiteId::new(n)
    }

    #[test]
    fn test_seed_installs_defaults_everywhere() {
        let store = MultiversionStore::seeded(&Placement::default());
        let seed = store.version_at(x(2), Tick::ZERO).unwrap();
        assert_eq!(seed.value, 20);
        assert_eq!(seed.commit_time, Tick::ZERO);
        assert_eq!(seed.sites.len(), 10);
        // Odd variables live at exactly one site.
        let seed = store.version_at(x(3), Tick::ZERO).unwrap();
        assert_eq!(seed.value, 30);
        assert_eq!(seed.sites.as_slice(), &[s(4)]);
    }

    #[test]
    fn test_version_at_picks_latest_at_or_before() {
        let mut store = MultiversionStore::seeded(&Placement::default());
        let mut clock = repcrec_core::Clock::new();
        let t1 = clock.advance();
        let t2 = clock.advance();
        let t3 = clock.advance();
        store.record(x(2), t1, 21, smallvec![s(1), s(2)]);
        store.record(x(2), t3, 23, smallvec![s(1)]);
        assert_eq!(store.version_at(x(2), Tick::ZERO).unwrap().value, 20);
        assert_eq!(store.version_at(x(2), t1).unwrap().value, 21);
        assert_eq!(store.version_at(x(2), t2).unwrap().value, 21);
        assert_eq!(store.version_at(x(2), t3).unwrap().value, 23);
    }

    #[test]
    fn test_later_commits_invisible_at_earlier_ticks() {
        let mut store = MultiversionStore::seeded(&Placement::default());
        let mut clock = repcrec_core::Clock::new();
        let snapshot = clock.advance();
        let later = clock.advance();
        store.record(x(4), later, 99, smallvec![s(1)]);
        assert_eq!(store.version_at(x(4), snapshot).unwrap().value, 40);
        assert_eq!(store.latest(x(4)).unwrap().value, 99);
    }

    #[test]
    fn test_history_is_oldest_first() {
        let mut store = MultiversionStore::seeded(&Placement::default());
        let mut clock = repcrec_core::Clock::new();
        store.record(x(2), clock.advance(), 21, smallvec![s(1)]);
        store.record(x(2), clock.advance(), 22, smallvec![s(2)]);
        let values: Vec<i64> = store.history(x(2)).map(|v| v.value).collect();
        assert_eq!(values, vec![20, 21, 22]);
    }

    #[test]
    fn test_version_count_includes_seed() {
        let mut store = MultiversionStore::seeded(&Placement::default());
        assert_eq!(store.version_count(x(6)), 1);
        let mut clock = repcrec_core::Clock::new();
        store.record(x(6), clock.advance(), 61, smallvec![s(1)]);
        assert_eq!(store.version_count(x(6)), 2);
    }
}
