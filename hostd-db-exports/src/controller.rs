// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::{DBBatch, HostDBError, Key, Value};
use hostd_models::chain_cursor::ChainCursor;
use parking_lot::RwLock;
use std::fmt::Debug;
use std::sync::Arc;

/// Controller of the durable transactional store. All multi-key updates of
/// one logical event, including the paired cursor update, go through
/// `write_batch` and are applied atomically: either all changes are
/// visible after a reboot or none are.
pub trait HostDBController: Send + Sync + Debug {
    /// Writes the batch to the DB, atomically with the new cursor if one
    /// is provided.
    fn write_batch(&mut self, batch: DBBatch, cursor: Option<ChainCursor>)
        -> Result<(), HostDBError>;

    /// Utility function to put / update a key & value in the batch
    fn put_or_update_entry_value(&self, batch: &mut DBBatch, key: Key, value: &[u8]);

    /// Utility function to delete a key & value in the batch
    fn delete_key(&self, batch: &mut DBBatch, key: Key);

    /// Get the persisted consensus cursor
    fn get_cursor(&self) -> Result<ChainCursor, HostDBError>;

    /// Exposes RocksDB's "get_cf" function
    fn get_cf(&self, handle_cf: &str, key: Key) -> Result<Option<Value>, HostDBError>;

    /// Exposes RocksDB's "iterator_cf" function
    fn iterator_cf(
        &self,
        handle_cf: &str,
        mode: HostIteratorMode,
    ) -> Box<dyn Iterator<Item = (Key, Value)> + '_>;

    /// Exposes RocksDB's "prefix_iterator_cf" function
    fn prefix_iterator_cf(
        &self,
        handle_cf: &str,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Key, Value)> + '_>;
}

/// Iteration mode over a column family
pub enum HostIteratorMode<'a> {
    /// from the first key
    Start,
    /// from the last key
    End,
    /// from the given key in the given direction
    From(&'a [u8], HostDirection),
}

/// Iteration direction
pub enum HostDirection {
    /// ascending key order
    Forward,
    /// descending key order
    Reverse,
}

/// The shared handle every component holds on the store
pub type ShareableHostDBController = Arc<RwLock<Box<dyn HostDBController>>>;
