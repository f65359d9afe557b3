//! The transaction coordinator.
//!
//! A single-threaded cooperative scheduler driven by the external command
//! stream. Each command is processed to completion: reads and writes are
//! routed to sites through the placement directory, lock conflicts run
//! the wait-die policy, operations that cannot proceed are queued at the
//! sites or parked on availability conditions, and every event that
//! frees resources (commit, abort, fail, recover) re-drives whatever it
//! made runnable, in original blocking order, before the next command is
//! accepted.
//!
//! Read-write transactions run under strict two-phase locking; read-only
//! transactions read the multiversion history without locks. The commit
//! decision at `end` requires every accessed site to have stayed up
//! since the transaction's first access there.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use smallvec::{smallvec, SmallVec};
use tracing::{debug, info, warn};

use repcrec_concurrency::{
    wait_die, MultiversionStore, Request, Transaction, TransactionKind, TransactionState,
    WaitDecision, WaitForGraph,
};
use repcrec_core::{
    AbortReason, Clock, Error, LockMode, Placement, Result, SiteId, Tick, TransactionId,
    VariableId,
};
use repcrec_storage::{Blockers, Grant, ReadLockReply, Site, WriteLockReply};

use crate::command::Command;
use crate::parked::{Condition, ParkedOps};
use crate::report::{Outcome, OutcomeLog};

/// Outcome of attempting one transaction request.
enum Attempt {
    /// Completed; any output went to the transcript.
    Done,
    /// Waiting on lock queues or parked on availability; the request
    /// stays at the head of the transaction's deferred queue.
    Held,
    /// The attempt aborted the transaction.
    Aborted,
}

/// One lock conflict found while acquiring locks for a request.
struct Conflict {
    site: SiteId,
    var: VariableId,
    mode: LockMode,
    blockers: Blockers,
}

/// The coordinator: owns the sites, the transactions, the wait-for
/// graph, and the multiversion history; everything else refers to them
/// by id.
#[derive(Debug)]
pub struct TransactionManager {
    placement: Placement,
    sites: BTreeMap<SiteId, Site>,
    txns: FxHashMap<TransactionId, Transaction>,
    wait_graph: WaitForGraph,
    versions: MultiversionStore,
    parked: ParkedOps,
    clock: Clock,
    log: OutcomeLog,
    transcript: Vec<String>,
    /// Transactions made runnable by the current event, keyed by the
    /// sequence of their blocking event so resume order matches parking
    /// order.
    ready: BTreeMap<u64, TransactionId>,
    block_seq: u64,
    draining: bool,
    commit_times: FxHashMap<TransactionId, Tick>,
}

impl TransactionManager {
    /// Create a coordinator over a fresh cluster. The data directory
    /// must not exist yet; one subdirectory per site is created under
    /// it and seeded with the default values.
    pub fn new(placement: Placement, data_dir: &Path) -> Result<Self> {
        if data_dir.exists() {
            return Err(Error::Config(format!(
                "data directory '{}' already exists",
                data_dir.display()
            )));
        }
        fs::create_dir_all(data_dir)?;
        let mut sites = BTreeMap::new();
        for site_id in placement.site_ids() {
            sites.insert(site_id, Site::create(site_id, data_dir, &placement)?);
        }
        let versions = MultiversionStore::seeded(&placement);
        info!(
            target: "repcrec",
            sites = placement.site_count(),
            variables = placement.variable_count(),
            "cluster initialized"
        );
        Ok(TransactionManager {
            placement,
            sites,
            txns: FxHashMap::default(),
            wait_graph: WaitForGraph::default(),
            versions,
            parked: ParkedOps::default(),
            clock: Clock::new(),
            log: OutcomeLog::default(),
            transcript: Vec::new(),
            ready: BTreeMap::new(),
            block_seq: 0,
            draining: false,
            commit_times: FxHashMap::default(),
        })
    }

    /// Process one command to completion, including every resume it
    /// cascades into.
    pub fn execute(&mut self, command: Command) -> Result<()> {
        let now = self.clock.advance();
        debug!(target: "repcrec", tick = %now, ?command, "processing command");
        match command {
            Command::Begin(txn) => self.begin(txn, TransactionKind::ReadWrite),
            Command::BeginRo(txn) => self.begin(txn, TransactionKind::ReadOnly),
            Command::Read { txn, var } => self.submit(txn, Request::Read(var)),
            Command::Write { txn, var, value } => self.submit(txn, Request::Write(var, value)),
            Command::End(txn) => self.submit(txn, Request::End),
            Command::Fail(site) => self.fail_site(site),
            Command::Recover(site) => self.recover_site(site),
            Command::Dump => {
                self.dump_all();
                Ok(())
            }
            Command::DumpVariable(var) => self.dump_variable(var),
            Command::DumpSite(site) => self.dump_site(site),
        }
    }

    // =========================================================================
    // Command entry points
    // =========================================================================

    fn begin(&mut self, id: TransactionId, kind: TransactionKind) -> Result<()> {
        if self.txns.contains_key(&id) {
            return Err(Error::Input(format!("{} already began", id)));
        }
        let start = self.clock.now();
        debug!(
            target: "repcrec::txn",
            txn = %id,
            start = %start,
            read_only = kind == TransactionKind::ReadOnly,
            "transaction started"
        );
        self.txns.insert(id, Transaction::new(id, kind, start));
        Ok(())
    }

    fn submit(&mut self, id: TransactionId, request: Request) -> Result<()> {
        let state = match self.txns.get(&id) {
            Some(txn) => txn.state(),
            None => return Err(Error::Input(format!("unknown transaction {}", id))),
        };
        match state {
            TransactionState::Aborted => {
                // Online aborts (wait-die) happen under the script's feet;
                // later commands for the dead transaction are expected.
                debug!(target: "repcrec::txn", txn = %id, "command for an aborted transaction ignored");
                return Ok(());
            }
            TransactionState::Committed => {
                return Err(Error::Input(format!("{} already ended", id)));
            }
            TransactionState::Blocked => {
                if let Some(txn) = self.txns.get_mut(&id) {
                    txn.push_request(request);
                }
                debug!(target: "repcrec::txn", txn = %id, "operation deferred behind a blocked head");
                return Ok(());
            }
            TransactionState::Active => {}
        }
        match request {
            Request::Read(var) | Request::Write(var, _)
                if !self.placement.contains_variable(var) =>
            {
                return Err(Error::Input(format!("unknown variable {}", var)));
            }
            Request::Write(..) if self.txns.get(&id).is_some_and(|t| t.is_read_only()) => {
                return Err(Error::Input(format!("{} is read-only and cannot write", id)));
            }
            _ => {}
        }
        if let Attempt::Held = self.attempt(id, request)? {
            if let Some(txn) = self.txns.get_mut(&id) {
                txn.push_request(request);
            }
        }
        Ok(())
    }

    fn fail_site(&mut self, site_id: SiteId) -> Result<()> {
        let now = self.clock.now();
        let Some(site) = self.sites.get_mut(&site_id) else {
            return Err(Error::Input(format!("unknown site {}", site_id)));
        };
        if !site.is_up() {
            warn!(target: "repcrec::site", site = site_id.index(), "fail of a down site ignored");
            return Ok(());
        }
        site.fail(now);
        // Lock requests queued there vanished with the lock table; cancel
        // the corresponding waits and resume transactions left with
        // nothing to wait for, so they can retry other replicas or park.
        let waiters: Vec<TransactionId> = self
            .txns
            .values()
            .filter(|t| t.is_blocked() && t.waits_at(site_id))
            .map(|t| t.id())
            .collect();
        for id in waiters {
            let mut resume = None;
            if let Some(txn) = self.txns.get_mut(&id) {
                txn.clear_lock_waits_at(site_id);
                if !txn.has_lock_waits() {
                    resume = Some((txn.blocked_seq(), id));
                }
            }
            if let Some((seq, txn_id)) = resume {
                self.wait_graph.remove_edges_from(txn_id);
                self.ready.insert(seq, txn_id);
            }
        }
        self.drain_ready()
    }

    fn recover_site(&mut self, site_id: SiteId) -> Result<()> {
        let now = self.clock.now();
        let Some(site) = self.sites.get_mut(&site_id) else {
            return Err(Error::Input(format!("unknown site {}", site_id)));
        };
        if site.is_up() {
            warn!(target: "repcrec::site", site = site_id.index(), "recover of an up site ignored");
            return Ok(());
        }
        site.recover(now);
        self.queue_condition(Condition::SiteUp(site_id));
        self.drain_ready()
    }

    // =========================================================================
    // Request attempts
    // =========================================================================

    fn attempt(&mut self, id: TransactionId, request: Request) -> Result<Attempt> {
        match request {
            Request::Read(var) => {
                if self.txns.get(&id).is_some_and(|t| t.is_read_only()) {
                    self.attempt_ro_read(id, var)
                } else {
                    self.attempt_rw_read(id, var)
                }
            }
            Request::Write(var, value) => self.attempt_write(id, var, value),
            Request::End => self.attempt_end(id),
        }
    }

    /// Read under strict 2PL: the transaction's own buffered write wins;
    /// otherwise the first up, non-stale replica (ascending site order)
    /// is asked for a read lock.
    fn attempt_rw_read(&mut self, id: TransactionId, var: VariableId) -> Result<Attempt> {
        if let Some(value) = self.txns.get(&id).and_then(|t| t.own_write(var)) {
            self.emit_read(id, var, value);
            return Ok(Attempt::Done);
        }
        let now = self.clock.now();
        for site_id in self.placement.sites_for(var) {
            let reply = {
                let Some(site) = self.sites.get_mut(&site_id) else {
                    continue;
                };
                if !site.is_up() {
                    continue;
                }
                site.read_lock(id, var)
            };
            match reply {
                ReadLockReply::Granted => {
                    let Some(value) = self.sites.get(&site_id).and_then(|s| s.committed_value(var))
                    else {
                        continue;
                    };
                    if let Some(txn) = self.txns.get_mut(&id) {
                        txn.record_access(site_id, now);
                    }
                    debug!(
                        target: "repcrec::txn",
                        txn = %id, var = %var, site = site_id.index(), value,
                        "read committed value"
                    );
                    self.emit_read(id, var, value);
                    return Ok(Attempt::Done);
                }
                ReadLockReply::Wait(blockers) => {
                    return self.block_on_locks(
                        id,
                        vec![Conflict {
                            site: site_id,
                            var,
                            mode: LockMode::Shared,
                            blockers,
                        }],
                    );
                }
                ReadLockReply::Stale | ReadLockReply::Down => continue,
            }
        }
        // No replica is both up and non-stale. A replicated variable only
        // becomes readable again once a committed write clears staleness
        // somewhere; a non-replicated one needs its home site back.
        let conditions: SmallVec<[Condition; 4]> = if self.placement.is_replicated(var) {
            smallvec![Condition::WriteCommitted(var)]
        } else {
            smallvec![Condition::SiteUp(self.placement.home_site(var))]
        };
        debug!(target: "repcrec::txn", txn = %id, var = %var, "read parked: no available replica");
        self.park(id, conditions);
        Ok(Attempt::Held)
    }

    /// Write under strict 2PL: write locks at every up site hosting the
    /// variable, then buffer the value at each.
    fn attempt_write(&mut self, id: TransactionId, var: VariableId, value: i64) -> Result<Attempt> {
        let now = self.clock.now();
        let replicas = self.placement.sites_for(var);
        let up_hosts: SmallVec<[SiteId; 10]> = replicas
            .iter()
            .copied()
            .filter(|s| self.sites.get(s).is_some_and(|site| site.is_up()))
            .collect();
        if up_hosts.is_empty() {
            let conditions: SmallVec<[Condition; 4]> =
                replicas.iter().copied().map(Condition::SiteUp).collect();
            debug!(target: "repcrec::txn", txn = %id, var = %var, "write parked: no up site hosts the variable");
            self.park(id, conditions);
            return Ok(Attempt::Held);
        }
        let mut conflicts: Vec<Conflict> = Vec::new();
        for site_id in &up_hosts {
            let reply = match self.sites.get_mut(site_id) {
                Some(site) => site.write_lock(id, var),
                None => continue,
            };
            match reply {
                WriteLockReply::Granted => {}
                WriteLockReply::Wait(blockers) => conflicts.push(Conflict {
                    site: *site_id,
                    var,
                    mode: LockMode::Exclusive,
                    blockers,
                }),
                WriteLockReply::Down => {}
            }
        }
        if !conflicts.is_empty() {
            // Locks already granted at other sites stay held.
            return self.block_on_locks(id, conflicts);
        }
        for site_id in &up_hosts {
            if let Some(site) = self.sites.get_mut(site_id) {
                site.buffer_write(id, var, value);
            }
            if let Some(txn) = self.txns.get_mut(&id) {
                txn.record_access(*site_id, now);
            }
        }
        if let Some(txn) = self.txns.get_mut(&id) {
            txn.note_write(var, value);
        }
        debug!(
            target: "repcrec::txn",
            txn = %id, var = %var, value, sites = up_hosts.len(),
            "write buffered at every up replica"
        );
        Ok(Attempt::Done)
    }

    /// Read from the multiversion history at the transaction's start
    /// time. Replicated values additionally need one installing site to
    /// have stayed up from the version's commit through the start.
    fn attempt_ro_read(&mut self, id: TransactionId, var: VariableId) -> Result<Attempt> {
        let start = match self.txns.get(&id) {
            Some(txn) => txn.start_time(),
            None => return Ok(Attempt::Done),
        };
        let version = match self.versions.version_at(var, start) {
            Some(v) => v.clone(),
            None => {
                self.abort(id, AbortReason::ReadOnlyUnavailableHistory)?;
                return Ok(Attempt::Aborted);
            }
        };
        if self.placement.is_replicated(var) {
            let witnessed = version.sites.iter().any(|s| {
                self.sites
                    .get(s)
                    .is_some_and(|site| site.was_up_throughout(version.commit_time, start))
            });
            if !witnessed {
                debug!(
                    target: "repcrec::txn",
                    txn = %id, var = %var,
                    "no replica covers the interval from the version's commit to the snapshot"
                );
                self.abort(id, AbortReason::ReadOnlyUnavailableHistory)?;
                return Ok(Attempt::Aborted);
            }
        }
        self.emit_read(id, var, version.value);
        Ok(Attempt::Done)
    }

    /// Finalize: read-only transactions always commit; read-write ones
    /// commit only if every accessed site stayed up since first access.
    fn attempt_end(&mut self, id: TransactionId) -> Result<Attempt> {
        let (kind, doomed) = {
            let Some(txn) = self.txns.get(&id) else {
                return Ok(Attempt::Done);
            };
            let doomed = txn.accessed_sites().any(|(site_id, first)| {
                !self
                    .sites
                    .get(&site_id)
                    .is_some_and(|s| s.is_up() && s.up_since().is_some_and(|up| up <= first))
            });
            (txn.kind(), doomed)
        };
        match kind {
            TransactionKind::ReadOnly => {
                self.finish_ro_commit(id);
                Ok(Attempt::Done)
            }
            TransactionKind::ReadWrite if doomed => {
                self.abort(id, AbortReason::SiteDownDuringAccess)?;
                Ok(Attempt::Aborted)
            }
            TransactionKind::ReadWrite => {
                self.commit_rw(id)?;
                Ok(Attempt::Done)
            }
        }
    }

    // =========================================================================
    // Blocking, parking, resuming
    // =========================================================================

    /// Run wait-die against every blocker; survivors queue their requests
    /// at the conflicting sites and block.
    fn block_on_locks(&mut self, id: TransactionId, conflicts: Vec<Conflict>) -> Result<Attempt> {
        let waiter_start = match self.txns.get(&id) {
            Some(txn) => txn.start_time(),
            None => return Ok(Attempt::Done),
        };
        for conflict in &conflicts {
            for blocker in &conflict.blockers {
                let Some(holder) = self.txns.get(blocker) else {
                    continue;
                };
                if wait_die(waiter_start, holder.start_time()) == WaitDecision::Die {
                    debug!(
                        target: "repcrec::txn",
                        waiter = %id, holder = %blocker, var = %conflict.var,
                        "wait-die: younger waiter aborts"
                    );
                    self.abort(id, AbortReason::WaitDie)?;
                    return Ok(Attempt::Aborted);
                }
            }
        }
        let seq = self.next_block_seq();
        for conflict in &conflicts {
            if let Some(site) = self.sites.get_mut(&conflict.site) {
                site.enqueue(id, conflict.var, conflict.mode);
            }
            if let Some(txn) = self.txns.get_mut(&id) {
                txn.add_lock_wait(conflict.site, conflict.var);
            }
            for blocker in &conflict.blockers {
                self.wait_graph.add_edge(id, *blocker);
            }
        }
        if let Some(txn) = self.txns.get_mut(&id) {
            txn.block(seq);
        }
        debug_assert!(
            self.wait_graph.find_cycle().is_none(),
            "wait-die admitted a wait cycle"
        );
        Ok(Attempt::Held)
    }

    /// Park the head operation on availability conditions.
    fn park(&mut self, id: TransactionId, conditions: SmallVec<[Condition; 4]>) {
        let seq = self.next_block_seq();
        self.parked.park(id, seq, conditions);
        if let Some(txn) = self.txns.get_mut(&id) {
            txn.block(seq);
        }
    }

    fn next_block_seq(&mut self) -> u64 {
        let seq = self.block_seq;
        self.block_seq += 1;
        seq
    }

    /// Account for grants issued while draining site queues; a blocked
    /// transaction whose last wait clears becomes ready.
    fn process_grants(&mut self, grants: Vec<(SiteId, Grant)>) {
        for (site_id, grant) in grants {
            debug!(
                target: "repcrec::site",
                txn = %grant.txn, var = %grant.var, site = site_id.index(), mode = %grant.mode,
                "queued lock granted"
            );
            let mut resume = None;
            if let Some(txn) = self.txns.get_mut(&grant.txn) {
                txn.clear_lock_wait(site_id, grant.var);
                if txn.is_blocked() && !txn.has_lock_waits() {
                    resume = Some((txn.blocked_seq(), grant.txn));
                }
            }
            if let Some((seq, txn_id)) = resume {
                self.wait_graph.remove_edges_from(txn_id);
                self.ready.insert(seq, txn_id);
            }
        }
    }

    /// Fire an availability condition; parked operations waiting on it
    /// become ready.
    fn queue_condition(&mut self, condition: Condition) {
        for (seq, txn_id) in self.parked.fire(condition) {
            self.ready.insert(seq, txn_id);
        }
    }

    /// Resume ready transactions in blocking order. Reentrant calls fold
    /// into the outermost drain so cascades stay iterative.
    fn drain_ready(&mut self) -> Result<()> {
        if self.draining {
            return Ok(());
        }
        self.draining = true;
        let result = self.drain_ready_inner();
        self.draining = false;
        result
    }

    fn drain_ready_inner(&mut self) -> Result<()> {
        while let Some((_, id)) = self.ready.pop_first() {
            let resumable = self
                .txns
                .get(&id)
                .is_some_and(|t| t.is_blocked() && !t.has_lock_waits());
            if !resumable {
                continue;
            }
            if let Some(txn) = self.txns.get_mut(&id) {
                txn.unblock();
            }
            debug!(target: "repcrec::txn", txn = %id, "resuming deferred operations");
            self.run_deferred(id)?;
        }
        Ok(())
    }

    /// Re-drive deferred operations FIFO until one holds again or the
    /// queue drains.
    fn run_deferred(&mut self, id: TransactionId) -> Result<()> {
        loop {
            let next = match self.txns.get(&id) {
                Some(txn) if txn.is_active() => txn.front_request(),
                _ => return Ok(()),
            };
            let Some(request) = next else {
                return Ok(());
            };
            match self.attempt(id, request)? {
                Attempt::Done => {
                    if let Some(txn) = self.txns.get_mut(&id) {
                        txn.pop_request();
                    }
                }
                Attempt::Held | Attempt::Aborted => return Ok(()),
            }
        }
    }

    // =========================================================================
    // Commit and abort
    // =========================================================================

    fn commit_rw(&mut self, id: TransactionId) -> Result<()> {
        let commit_time = self.clock.advance();
        // Install staged writes, gathering the installing sites per
        // variable for the version history.
        let mut installed: Vec<(VariableId, i64, SmallVec<[SiteId; 10]>)> = Vec::new();
        let site_ids: Vec<SiteId> = self.sites.keys().copied().collect();
        for site_id in site_ids {
            let pairs = match self.sites.get_mut(&site_id) {
                Some(site) if site.is_up() => site.commit(id)?,
                _ => Vec::new(),
            };
            for (var, value) in pairs {
                match installed.iter_mut().find(|(v, _, _)| *v == var) {
                    Some((_, _, sites)) => sites.push(site_id),
                    None => installed.push((var, value, smallvec![site_id])),
                }
            }
        }
        installed.sort_by_key(|(var, _, _)| *var);
        for (var, value, sites) in &installed {
            self.versions.record(*var, commit_time, *value, sites.clone());
        }
        let grants = self.release_everywhere(id, false);
        self.wait_graph.remove_all(id);
        if let Some(txn) = self.txns.get_mut(&id) {
            txn.mark_committed();
        }
        self.commit_times.insert(id, commit_time);
        self.log.record(id, Outcome::Committed);
        info!(
            target: "repcrec::txn",
            txn = %id, commit = %commit_time, writes = installed.len(),
            "transaction committed"
        );
        self.transcript.push(format!("{} commits", id));
        self.process_grants(grants);
        for (var, _, _) in &installed {
            self.queue_condition(Condition::WriteCommitted(*var));
        }
        self.drain_ready()
    }

    fn finish_ro_commit(&mut self, id: TransactionId) {
        if let Some(txn) = self.txns.get_mut(&id) {
            txn.mark_committed();
        }
        self.commit_times.insert(id, self.clock.now());
        self.log.record(id, Outcome::Committed);
        info!(target: "repcrec::txn", txn = %id, "read-only transaction committed");
        self.transcript.push(format!("{} commits", id));
    }

    fn abort(&mut self, id: TransactionId, reason: AbortReason) -> Result<()> {
        let grants = self.release_everywhere(id, true);
        self.wait_graph.remove_all(id);
        self.parked.remove(id);
        if let Some(txn) = self.txns.get_mut(&id) {
            txn.mark_aborted();
        }
        self.log.record(id, Outcome::Aborted(reason));
        warn!(target: "repcrec::txn", txn = %id, reason = %reason, "transaction aborted");
        self.transcript.push(format!("{} aborts ({})", id, reason));
        self.process_grants(grants);
        self.drain_ready()
    }

    /// Release `id`'s locks (and, for aborts, staged writes) at every
    /// site, collecting the grants the releases produced.
    fn release_everywhere(&mut self, id: TransactionId, discard: bool) -> Vec<(SiteId, Grant)> {
        let mut grants = Vec::new();
        let site_ids: Vec<SiteId> = self.sites.keys().copied().collect();
        for site_id in site_ids {
            if let Some(site) = self.sites.get_mut(&site_id) {
                let site_grants = if discard { site.abort(id) } else { site.release(id) };
                for grant in site_grants {
                    grants.push((site_id, grant));
                }
            }
        }
        grants
    }

    // =========================================================================
    // Output
    // =========================================================================

    fn emit_read(&mut self, id: TransactionId, var: VariableId, value: i64) {
        self.transcript.push(format!("{}: {}={}", id, var, value));
    }

    fn site_line(id: SiteId, site: &Site) -> String {
        let parts: Vec<String> = site
            .variables()
            .iter()
            .filter_map(|v| site.committed_value(*v).map(|value| format!("{}={}", v, value)))
            .collect();
        format!("site {}: {}", id, parts.join(", "))
    }

    fn dump_all(&mut self) {
        let lines: Vec<String> = self
            .sites
            .iter()
            .map(|(id, site)| Self::site_line(*id, site))
            .collect();
        self.transcript.extend(lines);
    }

    fn dump_variable(&mut self, var: VariableId) -> Result<()> {
        if !self.placement.contains_variable(var) {
            return Err(Error::Input(format!("unknown variable {}", var)));
        }
        let mut parts = Vec::new();
        for site_id in self.placement.sites_for(var) {
            if let Some(value) = self.sites.get(&site_id).and_then(|s| s.committed_value(var)) {
                parts.push(format!("site {} = {}", site_id, value));
            }
        }
        self.transcript.push(format!("{}: {}", var, parts.join(", ")));
        Ok(())
    }

    fn dump_site(&mut self, site_id: SiteId) -> Result<()> {
        match self.sites.get(&site_id) {
            Some(site) => {
                let line = Self::site_line(site_id, site);
                self.transcript.push(line);
                Ok(())
            }
            None => Err(Error::Input(format!("unknown site {}", site_id))),
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// The ordered commit/abort log.
    pub fn outcome_log(&self) -> &OutcomeLog {
        &self.log
    }

    /// Drain the transcript lines produced since the last call.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.transcript)
    }

    /// The placement directory in use.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// The coordinator's current logical time.
    pub fn current_tick(&self) -> Tick {
        self.clock.now()
    }

    /// Lifecycle state of a transaction, if it exists.
    pub fn transaction_state(&self, id: TransactionId) -> Option<TransactionState> {
        self.txns.get(&id).map(|t| t.state())
    }

    /// Sites a transaction accessed, with first-access ticks.
    pub fn accessed_sites_of(&self, id: TransactionId) -> Option<Vec<(SiteId, Tick)>> {
        self.txns.get(&id).map(|t| {
            let mut sites: Vec<_> = t.accessed_sites().collect();
            sites.sort();
            sites
        })
    }

    /// Committed value of `var` at `site`, if hosted there.
    pub fn committed_value(&self, site: SiteId, var: VariableId) -> Option<i64> {
        self.sites.get(&site).and_then(|s| s.committed_value(var))
    }

    /// Whether a site is currently up.
    pub fn site_is_up(&self, site: SiteId) -> Option<bool> {
        self.sites.get(&site).map(|s| s.is_up())
    }

    /// Whether `var`'s copy at `site` is stale since recovery.
    pub fn is_stale(&self, site: SiteId, var: VariableId) -> Option<bool> {
        self.sites.get(&site).map(|s| s.is_stale(var))
    }

    /// Whether one up-interval of `site` covers `[from, to]`.
    pub fn site_up_throughout(&self, site: SiteId, from: Tick, to: Tick) -> Option<bool> {
        self.sites.get(&site).map(|s| s.was_up_throughout(from, to))
    }

    /// A cycle in the wait-for graph, if one exists. Wait-die keeps this
    /// `None`; exposed for the property tests.
    pub fn find_wait_cycle(&self) -> Option<Vec<TransactionId>> {
        self.wait_graph.find_cycle()
    }

    /// True iff `id`'s head operation is parked on availability.
    pub fn is_parked(&self, id: TransactionId) -> bool {
        self.parked.contains(id)
    }

    /// Commit tick of a committed transaction.
    pub fn commit_time_of(&self, id: TransactionId) -> Option<Tick> {
        self.commit_times.get(&id).copied()
    }

    /// The committed version history of `var`, oldest first, as
    /// `(commit tick, value, installing sites)`. Exposed for the
    /// property tests.
    pub fn version_history(&self, var: VariableId) -> Vec<(Tick, i64, Vec<SiteId>)> {
        self.versions
            .history(var)
            .map(|v| (v.commit_time, v.value, v.sites.iter().copied().collect()))
            .collect()
    }
}
