// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! This module exports generic traits representing interfaces for
//! interacting with the obligation workers.

use std::collections::BTreeMap;

use hostd_models::chain_cursor::ChainCursor;
use hostd_models::obligation_id::ObligationId;
use hostd_models::transaction_id::TransactionId;

use crate::{ObligationResult, ObligationRevision, ObligationStatus, ObligationTerms, StorageObligation};

/// interface that communicates with the obligation workers
pub trait ObligationController: Send + Sync {
    /// Accept a renter's formation request: validate the terms, lock the
    /// collateral, persist the new obligation and return its identifier.
    fn create_obligation(&self, terms: ObligationTerms) -> ObligationResult<ObligationId>;

    /// Append a co-signed revision to an existing obligation.
    fn revise_obligation(
        &self,
        id: &ObligationId,
        revision: ObligationRevision,
    ) -> ObligationResult<()>;

    /// Record the broadcast revision transaction the consensus processor
    /// must watch for the latest revision.
    fn attach_revision_transaction(
        &self,
        id: &ObligationId,
        transaction: TransactionId,
    ) -> ObligationResult<()>;

    /// Get a snapshot of an obligation, if it exists.
    fn get_obligation(&self, id: &ObligationId) -> Option<StorageObligation>;

    /// Audit view: status of every obligation in the active set.
    fn obligation_statuses(&self) -> BTreeMap<ObligationId, ObligationStatus>;

    /// The persisted cursor of the last fully processed consensus change;
    /// the consensus supplier resubscribes from here.
    fn last_processed_cursor(&self) -> ObligationResult<ChainCursor>;

    /// Returns a boxed clone of self.
    /// Useful to allow cloning `Box<dyn ObligationController>`.
    fn clone_box(&self) -> Box<dyn ObligationController>;
}

/// Allow cloning `Box<dyn ObligationController>`
/// Uses `ObligationController::clone_box` internally
impl Clone for Box<dyn ObligationController> {
    fn clone(&self) -> Box<dyn ObligationController> {
        self.clone_box()
    }
}

/// Obligation manager used to stop the obligation worker threads
pub trait ObligationManager {
    /// Stop the workers. In-flight mutations are allowed to finish; no
    /// obligation mutation is interrupted mid-transaction.
    fn stop(&mut self);
}
