// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! The consensus change processor: consumes ordered block-apply/revert
//! notifications, updates the obligations whose watched transactions were
//! confirmed or unconfirmed, resolves obligations at the new tip height,
//! and advances the persisted cursor — all as one durable unit per
//! notification.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use hostd_models::block_id::BlockId;
use hostd_models::block_height::BlockHeight;
use hostd_models::chain_cursor::ChainCursor;
use hostd_models::transaction_id::TransactionId;
use hostd_obligation_exports::{
    ChainChangeNotification, ConfirmationStatus, FailureCause, ObligationConfig, ObligationError,
    ObligationEvent, ObligationResolution, ObligationResult, StorageObligation,
};
use tracing::{debug, error, info};

use crate::registry::{ConsensusOutcome, ObligationRegistry};
use crate::types::CollateralVault;

pub(crate) struct ConsensusWorker {
    config: ObligationConfig,
    registry: Arc<ObligationRegistry>,
    vault: Arc<CollateralVault>,
    notification_rx: Receiver<ChainChangeNotification>,
    stop_rx: Receiver<()>,
    event_tx: Sender<ObligationEvent>,
}

impl ConsensusWorker {
    /// Spawns the consensus change processor thread.
    pub(crate) fn spawn(
        config: ObligationConfig,
        registry: Arc<ObligationRegistry>,
        vault: Arc<CollateralVault>,
        notification_rx: Receiver<ChainChangeNotification>,
        stop_rx: Receiver<()>,
        event_tx: Sender<ObligationEvent>,
    ) -> thread::JoinHandle<()> {
        thread::Builder::new()
            .name("consensus change processor".into())
            .spawn(move || {
                let this = Self {
                    config,
                    registry,
                    vault,
                    notification_rx,
                    stop_rx,
                    event_tx,
                };
                this.run();
            })
            .expect("could not spawn consensus change processor thread")
    }

    /// Main loop: notifications are processed strictly in delivery order;
    /// the thread suspends while waiting for the next notification and
    /// while the per-notification durable transaction commits.
    fn run(self) {
        loop {
            crossbeam_channel::select! {
                recv(self.stop_rx) -> _ => {
                    debug!("consensus change processor received stop signal");
                    break;
                }
                recv(self.notification_rx) -> msg => {
                    let Ok(notification) = msg else {
                        // the supplier dropped the feed
                        break;
                    };
                    if let Err(err) = self.process_notification(notification) {
                        match &err {
                            ObligationError::ConsensusDesync(_) => {
                                error!("consensus change processor desynchronized: {}", err);
                                let _ = self.event_tx.send(ObligationEvent::Desync);
                            }
                            _ => {
                                error!("consensus change processor failed: {}", err);
                            }
                        }
                        break;
                    }
                }
            }
        }
    }

    /// Validates a notification against the persisted cursor and returns
    /// the post-notification tip. Reverts are delivered tip-first, applies
    /// in original block order.
    fn check_continuity(
        &self,
        notification: &ChainChangeNotification,
        start: ChainCursor,
    ) -> ObligationResult<ChainCursor> {
        let mut tip = start;
        for reverted in &notification.reverted {
            if reverted.id != tip.block || reverted.height != tip.height {
                return Err(ObligationError::ConsensusDesync(format!(
                    "reverted block {} at height {} does not match the cursor tip {}",
                    reverted.id, reverted.height, tip
                )));
            }
            tip = ChainCursor::new(tip.height.saturating_sub(1), reverted.parent);
        }
        for applied in &notification.applied {
            if applied.parent != tip.block
                || applied.height != tip.height.saturating_add(1)
            {
                return Err(ObligationError::ConsensusDesync(format!(
                    "applied block {} at height {} does not extend the cursor tip {}",
                    applied.id, applied.height, tip
                )));
            }
            tip = ChainCursor::new(applied.height, applied.id);
        }
        Ok(tip)
    }

    /// True if the notification's end state is exactly the current cursor:
    /// the whole notification was already durably applied before a crash
    /// or a redelivery, and must be skipped rather than reprocessed.
    fn already_applied(
        notification: &ChainChangeNotification,
        cursor: &ChainCursor,
    ) -> bool {
        match notification.applied.last() {
            Some(last) => last.id == cursor.block && last.height == cursor.height,
            None => notification
                .reverted
                .last()
                .map(|reverted| {
                    reverted.parent == cursor.block
                        && reverted.height.saturating_sub(1) == cursor.height
                })
                .unwrap_or(false),
        }
    }

    fn process_notification(
        &self,
        notification: ChainChangeNotification,
    ) -> ObligationResult<()> {
        let start_cursor = self.registry.cursor()?;
        if Self::already_applied(&notification, &start_cursor) {
            debug!("skipping already-applied consensus change at {}", start_cursor);
            return Ok(());
        }
        let tip = self.check_continuity(&notification, start_cursor)?;

        let reverted_blocks: HashSet<BlockId> =
            notification.reverted.iter().map(|block| block.id).collect();
        let mut confirmed_txs: HashMap<TransactionId, BlockId> = HashMap::new();
        for applied in &notification.applied {
            for transaction in &applied.transactions {
                confirmed_txs.insert(*transaction, applied.id);
            }
        }

        let ids = self.registry.all_ids();
        let final_height = tip.height;
        let retention = self.config.retention_period;

        self.registry
            .apply_consensus_mutations(&ids, tip, |current| {
                let mut obligation = current.clone();

                // revert flags owed to blocks that are no longer canonical
                revert_flag(&mut obligation.origin_confirmed, &reverted_blocks);
                revert_flag(&mut obligation.revision_confirmed, &reverted_blocks);
                revert_flag(&mut obligation.proof_confirmed, &reverted_blocks);

                // confirmations from the applied blocks; the origin must
                // confirm before the dependent transactions are considered
                if !obligation.origin_confirmed.is_confirmed() {
                    if let Some(block) = confirmed_txs.get(&obligation.origin_transaction) {
                        obligation.origin_confirmed =
                            ConfirmationStatus::Confirmed { block: *block };
                    }
                }
                if obligation.origin_confirmed.is_confirmed() {
                    if !obligation.revision_confirmed.is_confirmed() {
                        if let Some(transaction) = obligation.revision_transaction {
                            if let Some(block) = confirmed_txs.get(&transaction) {
                                obligation.revision_confirmed =
                                    ConfirmationStatus::Confirmed { block: *block };
                            }
                        }
                    }
                    if !obligation.proof_confirmed.is_confirmed() {
                        if let Some(transaction) = obligation.proof_transaction {
                            if let Some(block) = confirmed_txs.get(&transaction) {
                                obligation.proof_confirmed =
                                    ConfirmationStatus::Confirmed { block: *block };
                            }
                        }
                    }
                }

                self.resolve_at(&mut obligation, final_height);

                let archive = obligation.is_terminal()
                    && obligation
                        .proof_deadline_height
                        .saturating_add(retention)
                        <= final_height;

                if archive || obligation != *current {
                    Some(ConsensusOutcome {
                        obligation,
                        archive,
                    })
                } else {
                    None
                }
            })?;

        debug!(
            "processed consensus change: {} reverted, {} applied, cursor now {}",
            notification.reverted.len(),
            notification.applied.len(),
            tip
        );
        Ok(())
    }

    /// Resolution sweep at the given tip height. Terminal transitions (and
    /// their collateral/revenue accounting) happen exactly once on each
    /// edge; a revert that invalidates the evidence undoes the transition.
    fn resolve_at(&self, obligation: &mut StorageObligation, height: BlockHeight) {
        // undo resolutions whose evidence no longer holds
        match obligation.resolution {
            Some(ObligationResolution::Succeeded { .. })
                if !obligation.proof_confirmed.is_confirmed() =>
            {
                let payout = obligation.latest_revision().payout;
                obligation.accrued_revenue = obligation.accrued_revenue.saturating_sub(payout);
                obligation.resolution = None;
                self.vault.relock(obligation.locked_collateral);
                info!(
                    "obligation {} success reverted with its proof confirmation",
                    obligation.id
                );
            }
            Some(ObligationResolution::Failed {
                cause: FailureCause::MissedProofDeadline,
            }) if height < obligation.proof_deadline_height => {
                obligation.resolution = None;
                self.vault.relock(obligation.locked_collateral);
                info!(
                    "obligation {} deadline failure reverted below height {}",
                    obligation.id, obligation.proof_deadline_height
                );
            }
            _ => {}
        }

        // resolve unresolved obligations against the new tip
        if obligation.resolution.is_none() {
            if let ConfirmationStatus::Confirmed { block } = obligation.proof_confirmed {
                let payout = obligation.latest_revision().payout;
                obligation.accrued_revenue = obligation.accrued_revenue.saturating_add(payout);
                obligation.resolution = Some(ObligationResolution::Succeeded { block });
                self.vault.release(obligation.locked_collateral);
                info!(
                    "obligation {} succeeded, revenue {} accrued",
                    obligation.id, payout
                );
            } else if height >= obligation.proof_deadline_height {
                obligation.resolution = Some(ObligationResolution::Failed {
                    cause: FailureCause::MissedProofDeadline,
                });
                self.vault.release(obligation.locked_collateral);
                info!(
                    "obligation {} failed: no confirmed proof by height {}, {} collateral forfeited",
                    obligation.id, obligation.proof_deadline_height, obligation.risked_collateral
                );
            }
        }
    }
}

/// A confirmation owed to a reverted block goes back to the
/// unconfirmed family, keeping the revert auditable.
fn revert_flag(flag: &mut ConfirmationStatus, reverted_blocks: &HashSet<BlockId>) {
    if let ConfirmationStatus::Confirmed { block } = flag {
        if reverted_blocks.contains(block) {
            *flag = ConfirmationStatus::Reverted;
        }
    }
}
