// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! The proof scheduler: a periodic worker that walks the registry for
//! obligations whose proof submission window is open, constructs storage
//! proofs against the current sector roots and a per-window challenge
//! derived from the chain tip, and hands the finished transactions to the
//! broadcast collaborator.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use hostd_hash::Hash;
use hostd_models::chain_cursor::ChainCursor;
use hostd_models::merkle::build_merkle_proof;
use hostd_models::transaction_id::TransactionId;
use hostd_obligation_exports::{
    FailureCause, ObligationChannels, ObligationConfig, ObligationError, ObligationResolution,
    ObligationResult, ProofTransaction, StorageObligation,
};
use tracing::{debug, info, warn};

use crate::registry::ObligationRegistry;
use crate::types::CollateralVault;

pub(crate) struct ProofWorker {
    config: ObligationConfig,
    registry: Arc<ObligationRegistry>,
    vault: Arc<CollateralVault>,
    channels: ObligationChannels,
    stop_rx: Receiver<()>,
}

impl ProofWorker {
    /// Spawns the proof scheduler thread.
    pub(crate) fn spawn(
        config: ObligationConfig,
        registry: Arc<ObligationRegistry>,
        vault: Arc<CollateralVault>,
        channels: ObligationChannels,
        stop_rx: Receiver<()>,
    ) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name("proof scheduler".into())
            .spawn(move || {
                let this = Self {
                    config,
                    registry,
                    vault,
                    channels,
                    stop_rx,
                };
                this.run();
            })
            .expect("could not spawn proof scheduler thread")
    }

    /// Main loop: a periodic trigger, not event-driven. Broadcast is best
    /// effort; the confirmation status observed by the consensus processor
    /// is the only source of truth.
    fn run(self) {
        loop {
            match self.stop_rx.recv_timeout(self.config.proof_check_period) {
                // stop requested
                Ok(()) => break,
                // manager dropped, stop as well
                Err(RecvTimeoutError::Disconnected) => break,
                // period elapsed, run a scheduler pass
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(err) = self.process_pass() {
                        warn!("proof scheduler pass failed: {}", err);
                    }
                }
            }
        }
    }

    /// One scheduler pass over the obligations whose window contains the
    /// current tip height.
    fn process_pass(&self) -> ObligationResult<()> {
        let cursor = self.registry.cursor()?;
        let height = cursor.height;

        // every candidate expires at most proof_window blocks above the tip
        let candidates = self
            .registry
            .ids_expiring_through(height.saturating_add(self.config.proof_window))?;

        for id in candidates {
            let Some(obligation) = self.registry.get(&id) else {
                continue;
            };
            if obligation.is_terminal()
                || obligation.proof_confirmed.is_confirmed()
                || !obligation.in_proof_window(height, self.config.proof_window)
            {
                continue;
            }
            // the contract must exist on-chain before a proof can refer to it
            if !obligation.origin_confirmed.is_confirmed() {
                continue;
            }
            if obligation.sector_roots().is_empty() {
                // no data was ever stored: fail without attempting a proof
                if let Err(err) = self.fail_empty_obligation(&obligation) {
                    warn!("could not fail empty obligation {}: {}", id, err);
                }
                continue;
            }
            if let Some(submitted) = obligation.proof_submitted_at {
                if height < submitted.saturating_add(self.config.proof_retry_period) {
                    // a proof was recently handed to the broadcaster,
                    // wait for its confirmation before resubmitting
                    continue;
                }
            }

            match self.build_and_submit(&obligation, &cursor) {
                Ok(transaction_id) => {
                    let result = self.registry.with_obligation(&id, |current| {
                        let mut new_obligation = current.clone();
                        new_obligation.proof_transaction = Some(transaction_id);
                        new_obligation.proof_submitted_at = Some(height);
                        Ok(Some(new_obligation))
                    });
                    if let Err(err) = result {
                        warn!(
                            "could not record proof submission for obligation {}: {}",
                            id, err
                        );
                    } else {
                        info!(
                            "proof transaction {} submitted for obligation {} at height {}",
                            transaction_id, id, height
                        );
                    }
                }
                // transient failure: the obligation stays eligible for the
                // next pass
                Err(err) => warn!("proof submission failed for obligation {}: {}", id, err),
            }
        }
        Ok(())
    }

    /// Builds the proof transaction for one obligation and hands it to the
    /// broadcast collaborator.
    fn build_and_submit(
        &self,
        obligation: &StorageObligation,
        cursor: &ChainCursor,
    ) -> ObligationResult<TransactionId> {
        let roots = obligation.sector_roots();

        // per-window random challenge derived from a recent block
        let seed = Hash::compute_from_tuple(&[
            &cursor.block.to_bytes()[..],
            &obligation.id.to_bytes()[..],
        ]);
        let sector_index =
            (u64::from_be_bytes(seed.to_bytes()[..8].try_into().expect("seed is 32 bytes"))
                % roots.len() as u64) as usize;

        let sector_data = self.channels.sector_store.read(&roots[sector_index])?;
        if Hash::compute_from(&sector_data) != roots[sector_index] {
            return Err(ObligationError::SectorStore(format!(
                "sector data for root {} does not match its root",
                roots[sector_index]
            )));
        }
        let proof_path = build_merkle_proof(roots, sector_index)?;

        let transaction = ProofTransaction {
            obligation_id: obligation.id,
            revision_number: obligation.latest_revision().revision_number,
            sector_index: sector_index as u64,
            sector_data,
            proof_path,
        };
        self.channels.broadcaster.submit(&transaction)?;
        Ok(transaction.id())
    }

    /// Marks an obligation that never stored any data as failed.
    fn fail_empty_obligation(&self, obligation: &StorageObligation) -> ObligationResult<()> {
        let mut transitioned = false;
        let result = self.registry.with_obligation(&obligation.id, |current| {
            if current.is_terminal() {
                return Ok(None);
            }
            transitioned = true;
            let mut new_obligation = current.clone();
            new_obligation.resolution = Some(ObligationResolution::Failed {
                cause: FailureCause::EmptySectorRoots,
            });
            Ok(Some(new_obligation))
        });
        if result.is_ok() && transitioned {
            self.vault.release(obligation.locked_collateral);
            debug!(
                "obligation {} failed: proof window open with no sector roots",
                obligation.id
            );
        }
        result
    }
}
