// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! In-memory index of all obligations plus per-obligation mutual
//! exclusion: the single authoritative view the other components consult
//! and mutate. All mutation paths funnel through the per-obligation locks
//! so the store never observes interleaved partial writes for the same
//! obligation, and snapshots are published only after the durable commit
//! succeeded (commit-then-publish).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use hostd_db_exports::DBBatch;
use hostd_models::block_height::BlockHeight;
use hostd_models::chain_cursor::ChainCursor;
use hostd_models::currency::Currency;
use hostd_models::obligation_id::ObligationId;
use hostd_obligation_exports::{
    ObligationError, ObligationResult, ObligationStatus, StorageObligation,
};
use parking_lot::{Mutex, RwLock};

use crate::obligation_db::ObligationDB;

/// One registry entry: the per-obligation lock and, inside it, the
/// published snapshot. `None` marks an entry whose obligation left the
/// active set (archived) while a handle to the entry was still held.
struct ObligationEntry {
    snapshot: Mutex<Option<StorageObligation>>,
}

/// Outcome of a consensus mutation over one obligation.
pub(crate) struct ConsensusOutcome {
    /// the new snapshot to persist
    pub obligation: StorageObligation,
    /// move the obligation to the archive records instead of updating it
    pub archive: bool,
}

pub(crate) struct ObligationRegistry {
    store: ObligationDB,
    index: RwLock<HashMap<ObligationId, Arc<ObligationEntry>>>,
}

impl ObligationRegistry {
    pub fn new(store: ObligationDB) -> Self {
        Self {
            store,
            index: RwLock::new(HashMap::new()),
        }
    }

    /// Startup population: replays all obligations from the store before
    /// the first request is served.
    pub fn populate(&self) -> ObligationResult<()> {
        let obligations = self.store.iter_obligations()?;
        let mut index = self.index.write();
        for obligation in obligations {
            index.insert(
                obligation.id,
                Arc::new(ObligationEntry {
                    snapshot: Mutex::new(Some(obligation)),
                }),
            );
        }
        Ok(())
    }

    /// Inserts a brand-new obligation: persists it, then publishes it.
    /// Fails with `DuplicateIdentifier` if the identifier exists in the
    /// registry or the store (they never diverge on which ids exist, but
    /// both are checked).
    pub fn insert_new(&self, obligation: StorageObligation) -> ObligationResult<()> {
        let mut index = self.index.write();
        if index.contains_key(&obligation.id) {
            return Err(ObligationError::DuplicateIdentifier(obligation.id));
        }
        if self.store.get_obligation(&obligation.id)?.is_some()
            || self.store.get_archived_obligation(&obligation.id)?.is_some()
        {
            return Err(ObligationError::DuplicateIdentifier(obligation.id));
        }

        let mut batch = DBBatch::new();
        self.store.put_obligation(&obligation, &mut batch)?;
        self.store.write_batch(batch, None)?;

        index.insert(
            obligation.id,
            Arc::new(ObligationEntry {
                snapshot: Mutex::new(Some(obligation)),
            }),
        );
        Ok(())
    }

    /// Runs `f` under the obligation's exclusive lock. `f` receives the
    /// current snapshot and may propose a new one; the proposal is
    /// persisted through the store and only published to the registry
    /// after the commit succeeded. If `f` fails the store is not touched
    /// and the lock is still released.
    pub fn with_obligation<F>(&self, id: &ObligationId, f: F) -> ObligationResult<()>
    where
        F: FnOnce(&StorageObligation) -> ObligationResult<Option<StorageObligation>>,
    {
        let entry = {
            let index = self.index.read();
            index
                .get(id)
                .cloned()
                .ok_or(ObligationError::NotFound(*id))?
        };

        let mut guard = entry.snapshot.lock();
        let Some(current) = guard.as_ref() else {
            // archived concurrently
            return Err(ObligationError::NotFound(*id));
        };

        match f(current)? {
            Some(new_snapshot) => {
                let mut batch = DBBatch::new();
                self.store.put_obligation(&new_snapshot, &mut batch)?;
                self.store.write_batch(batch, None)?;

                *guard = Some(new_snapshot);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// The consensus change processor's multi-obligation path: locks the
    /// given obligations in sorted-id order, lets `mutate` propose a new
    /// snapshot for each, commits every proposal plus the cursor advance
    /// as one durable batch, then publishes all snapshots. The processor
    /// is the only multi-lock taker, so ordered acquisition cannot
    /// deadlock against the single-lock paths.
    pub fn apply_consensus_mutations<F>(
        &self,
        ids: &[ObligationId],
        cursor: ChainCursor,
        mut mutate: F,
    ) -> ObligationResult<()>
    where
        F: FnMut(&StorageObligation) -> Option<ConsensusOutcome>,
    {
        let mut sorted_ids: Vec<ObligationId> = ids.to_vec();
        sorted_ids.sort_unstable();
        sorted_ids.dedup();

        let entries: Vec<(ObligationId, Arc<ObligationEntry>)> = {
            let index = self.index.read();
            sorted_ids
                .iter()
                .filter_map(|id| index.get(id).map(|e| (*id, e.clone())))
                .collect()
        };

        let mut guards: Vec<_> = entries
            .iter()
            .map(|(_, entry)| entry.snapshot.lock())
            .collect();

        let mut batch = DBBatch::new();
        let mut outcomes: Vec<(usize, ConsensusOutcome)> = Vec::new();
        for (i, guard) in guards.iter().enumerate() {
            let Some(current) = guard.as_ref() else {
                continue;
            };
            if let Some(outcome) = mutate(current) {
                if outcome.archive {
                    self.store.archive_obligation(&outcome.obligation, &mut batch)?;
                } else {
                    self.store.put_obligation(&outcome.obligation, &mut batch)?;
                }
                outcomes.push((i, outcome));
            }
        }

        // one durable unit: every mutation of this notification plus the
        // cursor advance
        self.store.write_batch(batch, Some(cursor))?;

        // publish only after the commit
        let mut archived: Vec<ObligationId> = Vec::new();
        for (i, outcome) in outcomes {
            if outcome.archive {
                *guards[i] = None;
                archived.push(outcome.obligation.id);
            } else {
                *guards[i] = Some(outcome.obligation);
            }
        }
        drop(guards);

        if !archived.is_empty() {
            let mut index = self.index.write();
            for id in archived {
                index.remove(&id);
            }
        }
        Ok(())
    }

    /// Snapshot read of one obligation.
    pub fn get(&self, id: &ObligationId) -> Option<StorageObligation> {
        let entry = self.index.read().get(id).cloned()?;
        let guard = entry.snapshot.lock();
        guard.clone()
    }

    /// All active obligation identifiers.
    pub fn all_ids(&self) -> Vec<ObligationId> {
        self.index.read().keys().copied().collect()
    }

    /// Status of every active obligation.
    pub fn statuses(&self) -> BTreeMap<ObligationId, ObligationStatus> {
        let entries: Vec<(ObligationId, Arc<ObligationEntry>)> = self
            .index
            .read()
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect();
        entries
            .into_iter()
            .filter_map(|(id, entry)| {
                let guard = entry.snapshot.lock();
                guard.as_ref().map(|obligation| (id, obligation.status()))
            })
            .collect()
    }

    /// Identifiers of obligations whose expiration height is at most
    /// `bound`, from the store's expiry index.
    pub fn ids_expiring_through(&self, bound: BlockHeight) -> ObligationResult<Vec<ObligationId>> {
        self.store.ids_expiring_through(bound)
    }

    /// The persisted cursor of the last fully processed consensus change.
    pub fn cursor(&self) -> ObligationResult<ChainCursor> {
        self.store.get_cursor()
    }

    /// Sum of the collateral locked by non-terminal obligations; restores
    /// the collateral accounting after a restart.
    pub fn locked_collateral_total(&self) -> Currency {
        let entries: Vec<Arc<ObligationEntry>> =
            self.index.read().values().cloned().collect();
        let mut total = Currency::zero();
        for entry in entries {
            let guard = entry.snapshot.lock();
            if let Some(obligation) = guard.as_ref() {
                if !obligation.is_terminal() {
                    total = total.saturating_add(obligation.locked_collateral);
                }
            }
        }
        total
    }
}
