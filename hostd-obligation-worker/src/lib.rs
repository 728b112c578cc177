// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Implementation of the storage-obligation core: the durable obligation
//! store, the in-memory registry with per-obligation locking, the renter
//! lifecycle controller, the consensus change processor and the proof
//! scheduler.

#![warn(missing_docs)]

mod consensus_worker;
mod controller_impl;
mod manager;
mod obligation_db;
mod proof_worker;
mod registry;
mod types;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crossbeam_channel::Sender;
use hostd_db_exports::ShareableHostDBController;
use hostd_obligation_exports::{
    ChainChangeNotification, ObligationChannels, ObligationConfig, ObligationController,
    ObligationManager, ObligationResult,
};

use crate::consensus_worker::ConsensusWorker;
use crate::controller_impl::ObligationControllerImpl;
use crate::manager::ObligationManagerImpl;
use crate::obligation_db::ObligationDB;
use crate::proof_worker::ProofWorker;
use crate::registry::ObligationRegistry;
use crate::types::CollateralVault;

/// Starts the obligation workers over an opened store.
///
/// Populates the registry from disk before serving the first request,
/// spawns the consensus change processor and the proof scheduler, and
/// returns the manager (to stop the workers), the controller (the public
/// mutation API) and the sender the external consensus supplier feeds
/// with ordered chain change notifications. The feed channel is a
/// rendezvous channel: the supplier's `send` blocks until the processor
/// has durably committed the previous notification and asks for the next.
pub fn start_obligation_worker(
    config: ObligationConfig,
    db: ShareableHostDBController,
    channels: ObligationChannels,
) -> ObligationResult<(
    Box<dyn ObligationManager>,
    Box<dyn ObligationController>,
    Sender<ChainChangeNotification>,
)> {
    let store = ObligationDB::new(db, &config);
    let registry = Arc::new(ObligationRegistry::new(store));
    registry.populate()?;

    let vault = Arc::new(CollateralVault::new(
        config.collateral_budget,
        registry.locked_collateral_total(),
    ));

    let (notification_tx, notification_rx) = crossbeam_channel::bounded(0);
    let (consensus_stop_tx, consensus_stop_rx) = crossbeam_channel::bounded(1);
    let (proof_stop_tx, proof_stop_rx) = crossbeam_channel::bounded(1);

    let consensus_thread = ConsensusWorker::spawn(
        config.clone(),
        registry.clone(),
        vault.clone(),
        notification_rx,
        consensus_stop_rx,
        channels.event_tx.clone(),
    );
    let proof_thread = ProofWorker::spawn(
        config.clone(),
        registry.clone(),
        vault.clone(),
        channels,
        proof_stop_rx,
    );

    let manager = ObligationManagerImpl::new(
        consensus_thread,
        proof_thread,
        consensus_stop_tx,
        proof_stop_tx,
    );
    let controller = ObligationControllerImpl::new(config, registry, vault);

    Ok((Box::new(manager), Box::new(controller), notification_tx))
}
