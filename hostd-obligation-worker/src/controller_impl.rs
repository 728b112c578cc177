// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! The state machine's public mutation API, invoked when a renter forms,
//! revises or renews a contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use hostd_models::chain_cursor::ChainCursor;
use hostd_models::obligation_id::ObligationId;
use hostd_models::transaction_id::TransactionId;
use hostd_obligation_exports::{
    ConfirmationStatus, ObligationConfig, ObligationController, ObligationError, ObligationResult,
    ObligationRevision, ObligationStatus, ObligationTerms, StorageObligation,
};
use tracing::{debug, info};

use crate::registry::ObligationRegistry;
use crate::types::CollateralVault;

#[derive(Clone)]
pub(crate) struct ObligationControllerImpl {
    config: ObligationConfig,
    registry: Arc<ObligationRegistry>,
    vault: Arc<CollateralVault>,
}

impl ObligationControllerImpl {
    pub fn new(
        config: ObligationConfig,
        registry: Arc<ObligationRegistry>,
        vault: Arc<CollateralVault>,
    ) -> Self {
        Self {
            config,
            registry,
            vault,
        }
    }

    fn check_terms(&self, terms: &ObligationTerms) -> ObligationResult<()> {
        if terms.expiration_height <= terms.negotiation_height {
            return Err(ObligationError::ValidationError(format!(
                "expiration height {} must be after negotiation height {}",
                terms.expiration_height, terms.negotiation_height
            )));
        }
        if terms.proof_deadline_height < terms.expiration_height {
            return Err(ObligationError::ValidationError(format!(
                "proof deadline {} cannot precede expiration height {}",
                terms.proof_deadline_height, terms.expiration_height
            )));
        }
        if terms.sector_roots.len() as u64 > self.config.max_sector_roots {
            return Err(ObligationError::ValidationError(format!(
                "terms commit {} sector roots, more than the allowed {}",
                terms.sector_roots.len(),
                self.config.max_sector_roots
            )));
        }
        let signing_hash = terms.signing_hash();
        terms
            .renter_key
            .verify_signature(&signing_hash, &terms.renter_signature)
            .map_err(|err| {
                ObligationError::ValidationError(format!("invalid renter signature: {}", err))
            })?;
        terms
            .host_key
            .verify_signature(&signing_hash, &terms.host_signature)
            .map_err(|err| {
                ObligationError::ValidationError(format!("invalid host signature: {}", err))
            })?;
        Ok(())
    }

    fn check_revision(
        &self,
        obligation: &StorageObligation,
        revision: &ObligationRevision,
    ) -> ObligationResult<()> {
        if obligation.is_terminal() {
            return Err(ObligationError::ValidationError(format!(
                "obligation {} already reached status {:?}",
                obligation.id,
                obligation.status()
            )));
        }
        let latest = obligation.latest_revision();
        if revision.revision_number <= latest.revision_number {
            return Err(ObligationError::ValidationError(format!(
                "revision number {} does not increase the current {}",
                revision.revision_number, latest.revision_number
            )));
        }
        if revision.payout < latest.payout {
            return Err(ObligationError::ValidationError(format!(
                "revision payout {} decreases the committed {}",
                revision.payout, latest.payout
            )));
        }
        if revision.collateral < latest.collateral {
            return Err(ObligationError::ValidationError(format!(
                "revision collateral {} decreases the committed {}",
                revision.collateral, latest.collateral
            )));
        }
        if obligation.revisions.len() as u64 >= self.config.max_revisions {
            return Err(ObligationError::ValidationError(format!(
                "obligation {} reached the maximum of {} revisions",
                obligation.id, self.config.max_revisions
            )));
        }
        if revision.sector_roots.len() as u64 > self.config.max_sector_roots {
            return Err(ObligationError::ValidationError(format!(
                "revision commits {} sector roots, more than the allowed {}",
                revision.sector_roots.len(),
                self.config.max_sector_roots
            )));
        }
        let signing_hash = revision.signing_hash(&obligation.id);
        obligation
            .renter_key
            .verify_signature(&signing_hash, &revision.renter_signature)
            .map_err(|err| {
                ObligationError::ValidationError(format!("invalid renter signature: {}", err))
            })?;
        obligation
            .host_key
            .verify_signature(&signing_hash, &revision.host_signature)
            .map_err(|err| {
                ObligationError::ValidationError(format!("invalid host signature: {}", err))
            })?;
        Ok(())
    }
}

impl ObligationController for ObligationControllerImpl {
    /// Accept a renter's formation request.
    fn create_obligation(&self, terms: ObligationTerms) -> ObligationResult<ObligationId> {
        self.check_terms(&terms)?;

        let collateral = terms.collateral;
        // lock the collateral first so a concurrent creation cannot
        // overcommit the budget, release it again if persistence fails
        self.vault.lock(collateral)?;

        let obligation = StorageObligation::from_terms(terms);
        let id = obligation.id;
        if let Err(err) = self.registry.insert_new(obligation) {
            self.vault.release(collateral);
            return Err(err);
        }

        info!("obligation {} created, collateral {} locked", id, collateral);
        Ok(id)
    }

    /// Append a co-signed revision to an existing obligation.
    fn revise_obligation(
        &self,
        id: &ObligationId,
        revision: ObligationRevision,
    ) -> ObligationResult<()> {
        let vault = self.vault.clone();
        let mut locked_delta = None;
        let result = self.registry.with_obligation(id, |obligation| {
            self.check_revision(obligation, &revision)?;

            let latest = obligation.latest_revision();
            let delta = revision
                .collateral
                .checked_sub(latest.collateral)
                .unwrap_or_default();
            if !delta.is_zero() {
                vault.lock(delta)?;
                locked_delta = Some(delta);
            }

            let mut new_obligation = obligation.clone();
            new_obligation.locked_collateral =
                new_obligation.locked_collateral.saturating_add(delta);
            new_obligation.risked_collateral =
                new_obligation.risked_collateral.saturating_add(delta);
            // a new revision supersedes any previously watched revision
            // transaction until the renter broadcasts the new one
            new_obligation.revision_transaction = None;
            new_obligation.revision_confirmed = ConfirmationStatus::Unconfirmed;
            new_obligation.revisions.push(revision.clone());
            Ok(Some(new_obligation))
        });

        if result.is_err() {
            if let Some(delta) = locked_delta {
                self.vault.release(delta);
            }
        } else {
            debug!(
                "obligation {} revised to revision {}",
                id, revision.revision_number
            );
        }
        result
    }

    /// Record the broadcast revision transaction to watch.
    fn attach_revision_transaction(
        &self,
        id: &ObligationId,
        transaction: TransactionId,
    ) -> ObligationResult<()> {
        self.registry.with_obligation(id, |obligation| {
            if obligation.is_terminal() {
                return Err(ObligationError::ValidationError(format!(
                    "obligation {} already reached status {:?}",
                    obligation.id,
                    obligation.status()
                )));
            }
            let mut new_obligation = obligation.clone();
            new_obligation.revision_transaction = Some(transaction);
            new_obligation.revision_confirmed = ConfirmationStatus::Unconfirmed;
            Ok(Some(new_obligation))
        })
    }

    /// Get a snapshot of an obligation, if it exists.
    fn get_obligation(&self, id: &ObligationId) -> Option<StorageObligation> {
        self.registry.get(id)
    }

    /// Audit view: status of every obligation in the active set.
    fn obligation_statuses(&self) -> BTreeMap<ObligationId, ObligationStatus> {
        self.registry.statuses()
    }

    /// The persisted cursor, for supplier resubscription.
    fn last_processed_cursor(&self) -> ObligationResult<ChainCursor> {
        self.registry.cursor()
    }

    fn clone_box(&self) -> Box<dyn ObligationController> {
        Box::new(self.clone())
    }
}
