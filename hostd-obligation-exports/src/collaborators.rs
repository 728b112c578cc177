// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Abstract capability interfaces of the external collaborators. The
//! production daemon plugs its wallet/transaction-pool and sector storage
//! in here; tests substitute doubles that return injected failures.

use crate::error::ObligationError;
use crate::proof::ProofTransaction;
use hostd_hash::Hash;

/// Hands finished transactions to the network for on-chain inclusion.
/// Best effort: no delivery guarantee is assumed by the core, the
/// confirmation status observed by the consensus processor is the only
/// source of truth.
pub trait TransactionBroadcaster: Send + Sync {
    /// Submit a proof transaction for broadcast.
    fn submit(&self, transaction: &ProofTransaction) -> Result<(), ObligationError>;
}

/// Content-addressable blob store holding the sector data committed under
/// the obligations. Authoritative for data presence; its failure-recovery
/// logic is its own.
pub trait SectorStore: Send + Sync {
    /// Read the sector with the given root.
    fn read(&self, root: &Hash) -> Result<Vec<u8>, ObligationError>;

    /// Write a sector and return its root.
    fn write(&self, bytes: &[u8]) -> Result<Hash, ObligationError>;

    /// Delete the sector with the given root.
    fn delete(&self, root: &Hash) -> Result<(), ObligationError>;
}
