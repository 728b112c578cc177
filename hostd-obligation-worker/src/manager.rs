// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crossbeam_channel::Sender;
use hostd_obligation_exports::ObligationManager;
use std::thread;
use tracing::info;

/// Implementation of the manager stopping the obligation worker threads.
pub(crate) struct ObligationManagerImpl {
    consensus_thread: Option<thread::JoinHandle<()>>,
    proof_thread: Option<thread::JoinHandle<()>>,
    consensus_stop_tx: Option<Sender<()>>,
    proof_stop_tx: Option<Sender<()>>,
}

impl ObligationManagerImpl {
    pub fn new(
        consensus_thread: thread::JoinHandle<()>,
        proof_thread: thread::JoinHandle<()>,
        consensus_stop_tx: Sender<()>,
        proof_stop_tx: Sender<()>,
    ) -> Self {
        Self {
            consensus_thread: Some(consensus_thread),
            proof_thread: Some(proof_thread),
            consensus_stop_tx: Some(consensus_stop_tx),
            proof_stop_tx: Some(proof_stop_tx),
        }
    }
}

impl ObligationManager for ObligationManagerImpl {
    /// Stop the obligation workers. In-flight operations finish before the
    /// threads are joined; no mutation is interrupted mid-transaction.
    fn stop(&mut self) {
        info!("stopping obligation workers...");
        if let Some(stop_tx) = self.consensus_stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(stop_tx) = self.proof_stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.consensus_thread.take() {
            join_handle
                .join()
                .expect("consensus change processor panicked");
        }
        if let Some(join_handle) = self.proof_thread.take() {
            join_handle.join().expect("proof scheduler panicked");
        }
        info!("obligation workers stopped");
    }
}
