// Copyright (c) 2022 MASSA LABS <info@massa.net>

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use tempfile::TempDir;

use hostd_db_exports::{HostDBConfig, HostDBController, ShareableHostDBController};
use hostd_db_worker::HostDB;
use hostd_hash::Hash;
use hostd_models::block_id::BlockId;
use hostd_models::chain_cursor::ChainCursor;
use hostd_models::transaction_id::TransactionId;
use hostd_obligation_exports::{
    AppliedBlock, ChainChangeNotification, ObligationChannels, ObligationConfig,
    ObligationController, ObligationError, ObligationEvent, ObligationManager, ProofTransaction,
    RevertedBlock, SectorStore, TransactionBroadcaster,
};

use crate::start_obligation_worker;

/// Opens a fresh store over the given path, shared the way the embedding
/// daemon shares it.
pub fn open_db(path: &Path) -> ShareableHostDBController {
    let db = HostDB::new(HostDBConfig {
        path: path.to_path_buf(),
        ..Default::default()
    })
    .expect("could not open the obligation store");
    Arc::new(RwLock::new(Box::new(db) as Box<dyn HostDBController>))
}

/// A short scheduler period so scheduler-driven scenarios converge fast.
pub fn fast_scheduler_config() -> ObligationConfig {
    ObligationConfig {
        proof_check_period: Duration::from_millis(50),
        ..Default::default()
    }
}

/// A configuration whose scheduler effectively never runs, for scenarios
/// driven purely by the consensus feed.
pub fn no_scheduler_config() -> ObligationConfig {
    ObligationConfig {
        proof_check_period: Duration::from_secs(3_600),
        ..Default::default()
    }
}

pub struct ObligationTestBoilerPlate {
    pub controller: Box<dyn ObligationController>,
    pub manager: Box<dyn ObligationManager>,
    pub feed: Sender<ChainChangeNotification>,
    pub event_rx: Receiver<ObligationEvent>,
}

/// Boilerplate: opens a temporary store, starts the workers, runs the
/// test body, stops the workers.
pub fn obligation_test<F>(
    config: ObligationConfig,
    broadcaster: Arc<dyn TransactionBroadcaster>,
    sector_store: Arc<dyn SectorStore>,
    test: F,
) where
    F: FnOnce(&mut ObligationTestBoilerPlate),
{
    let temp_dir = TempDir::new().expect("cannot create temp dir");
    let db = open_db(temp_dir.path());
    let (event_tx, event_rx) = unbounded();
    let channels = ObligationChannels {
        broadcaster,
        sector_store,
        event_tx,
    };
    let (manager, controller, feed) =
        start_obligation_worker(config, db, channels).expect("could not start obligation worker");
    let mut boilerplate = ObligationTestBoilerPlate {
        controller,
        manager,
        feed,
        event_rx,
    };
    test(&mut boilerplate);
    boilerplate.manager.stop();
}

/// Spins until `cond` holds, panicking after a timeout.
pub fn wait_until<F: Fn() -> bool>(cond: F, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        if Instant::now() > deadline {
            panic!("timeout waiting for {}", what);
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Builds chain change notifications that are always consistent with the
/// previously delivered ones, and remembers reverted blocks so the exact
/// same block can be re-applied.
pub struct ChainSimulator {
    tip: ChainCursor,
    chain: Vec<AppliedBlock>,
    reverted_stash: Vec<AppliedBlock>,
    nonce: u64,
}

impl ChainSimulator {
    pub fn new() -> Self {
        Self {
            tip: ChainCursor::genesis(),
            chain: Vec::new(),
            reverted_stash: Vec::new(),
            nonce: 0,
        }
    }

    /// Current simulated tip, the cursor the core must converge to.
    pub fn tip(&self) -> ChainCursor {
        self.tip
    }

    fn next_block(&mut self, transactions: Vec<TransactionId>) -> AppliedBlock {
        let height = self.tip.height.saturating_add(1);
        self.nonce += 1;
        let id = BlockId::new(Hash::compute_from_tuple(&[
            b"block",
            &height.0.to_be_bytes(),
            &self.nonce.to_be_bytes(),
        ]));
        let block = AppliedBlock {
            id,
            parent: self.tip.block,
            height,
            transactions,
        };
        self.tip = ChainCursor::new(height, id);
        self.chain.push(block.clone());
        block
    }

    /// One notification applying one block carrying the given transactions.
    pub fn apply(&mut self, transactions: Vec<TransactionId>) -> ChainChangeNotification {
        let block = self.next_block(transactions);
        ChainChangeNotification {
            reverted: vec![],
            applied: vec![block],
        }
    }

    /// One notification applying empty blocks up to the given height.
    pub fn advance_to(&mut self, height: u64) -> ChainChangeNotification {
        let mut applied = Vec::new();
        while self.tip.height.0 < height {
            applied.push(self.next_block(vec![]));
        }
        ChainChangeNotification {
            reverted: vec![],
            applied,
        }
    }

    /// One notification reverting the current tip block.
    pub fn revert_tip(&mut self) -> ChainChangeNotification {
        let block = self.chain.pop().expect("no block to revert");
        self.tip = ChainCursor::new(block.height.saturating_sub(1), block.parent);
        let notification = ChainChangeNotification {
            reverted: vec![RevertedBlock {
                id: block.id,
                parent: block.parent,
                height: block.height,
            }],
            applied: vec![],
        };
        self.reverted_stash.push(block);
        notification
    }

    /// One notification re-applying the most recently reverted block,
    /// byte-identical to its first application.
    pub fn reapply_reverted(&mut self) -> ChainChangeNotification {
        let block = self.reverted_stash.pop().expect("no reverted block");
        self.tip = ChainCursor::new(block.height, block.id);
        self.chain.push(block.clone());
        ChainChangeNotification {
            reverted: vec![],
            applied: vec![block],
        }
    }
}

/// Sends a notification and waits until the processor durably committed it.
pub fn send_and_wait(
    boilerplate: &ObligationTestBoilerPlate,
    simulator: &ChainSimulator,
    notification: ChainChangeNotification,
) {
    boilerplate
        .feed
        .send(notification)
        .expect("the consensus change processor is gone");
    let expected = simulator.tip();
    wait_until(
        || {
            boilerplate
                .controller
                .last_processed_cursor()
                .map(|cursor| cursor == expected)
                .unwrap_or(false)
        },
        "cursor to reach the simulated tip",
    );
}

/// Broadcast collaborator double that records every submitted proof
/// transaction and can be told to fail its first submissions.
pub struct CapturingBroadcaster {
    pub sent: parking_lot::Mutex<Vec<ProofTransaction>>,
    failures_left: AtomicUsize,
}

impl CapturingBroadcaster {
    pub fn new() -> Self {
        Self {
            sent: parking_lot::Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(0),
        }
    }

    /// A broadcaster whose first `failures` submissions fail transiently.
    pub fn failing(failures: usize) -> Self {
        Self {
            sent: parking_lot::Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(failures),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl TransactionBroadcaster for CapturingBroadcaster {
    fn submit(&self, transaction: &ProofTransaction) -> Result<(), ObligationError> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok()
        {
            return Err(ObligationError::BroadcastError(
                "injected broadcast failure".to_string(),
            ));
        }
        self.sent.lock().push(transaction.clone());
        Ok(())
    }
}

/// Writes `count` distinct sectors into the store and returns their roots.
pub fn store_sectors(store: &dyn SectorStore, count: usize) -> Vec<Hash> {
    (0..count)
        .map(|i| {
            store
                .write(format!("sector data {}", i).as_bytes())
                .expect("could not write sector")
        })
        .collect()
}

/// Waits until the obligation carries a submitted proof transaction and
/// returns it.
pub fn wait_for_proof_submission(
    boilerplate: &ObligationTestBoilerPlate,
    id: &hostd_models::obligation_id::ObligationId,
) -> TransactionId {
    wait_until(
        || {
            boilerplate
                .controller
                .get_obligation(id)
                .map(|obligation| obligation.proof_transaction.is_some())
                .unwrap_or(false)
        },
        "a proof transaction to be submitted",
    );
    boilerplate
        .controller
        .get_obligation(id)
        .expect("obligation disappeared")
        .proof_transaction
        .expect("proof transaction disappeared")
}
