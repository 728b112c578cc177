// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Doubles of the external collaborators. The mocks inject failures and
//! assert call patterns; `MemorySectorStore` is a working in-memory blob
//! store for scenarios that need real sector data.

use std::collections::HashMap;
use std::sync::Mutex;

use hostd_hash::Hash;
use mockall::mock;

use crate::{ObligationError, ProofTransaction, SectorStore, TransactionBroadcaster};

mock! {
    /// mock of the broadcast collaborator
    pub TransactionBroadcaster {}

    impl TransactionBroadcaster for TransactionBroadcaster {
        fn submit(&self, transaction: &ProofTransaction) -> Result<(), ObligationError>;
    }
}

mock! {
    /// mock of the sector blob store
    pub SectorStore {}

    impl SectorStore for SectorStore {
        fn read(&self, root: &Hash) -> Result<Vec<u8>, ObligationError>;
        fn write(&self, bytes: &[u8]) -> Result<Hash, ObligationError>;
        fn delete(&self, root: &Hash) -> Result<(), ObligationError>;
    }
}

/// A working in-memory sector store, content-addressed by hash.
#[derive(Default)]
pub struct MemorySectorStore {
    sectors: Mutex<HashMap<Hash, Vec<u8>>>,
}

impl MemorySectorStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SectorStore for MemorySectorStore {
    fn read(&self, root: &Hash) -> Result<Vec<u8>, ObligationError> {
        self.sectors
            .lock()
            .expect("sector store lock poisoned")
            .get(root)
            .cloned()
            .ok_or_else(|| ObligationError::SectorStore(format!("unknown sector root {}", root)))
    }

    fn write(&self, bytes: &[u8]) -> Result<Hash, ObligationError> {
        let root = Hash::compute_from(bytes);
        self.sectors
            .lock()
            .expect("sector store lock poisoned")
            .insert(root, bytes.to_vec());
        Ok(root)
    }

    fn delete(&self, root: &Hash) -> Result<(), ObligationError> {
        self.sectors
            .lock()
            .expect("sector store lock poisoned")
            .remove(root)
            .map(|_| ())
            .ok_or_else(|| ObligationError::SectorStore(format!("unknown sector root {}", root)))
    }
}
