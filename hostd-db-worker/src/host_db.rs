// Copyright (c) 2022 MASSA LABS <info@massa.net>

use hostd_db_exports::{
    DBBatch, HostDBConfig, HostDBController, HostDBError, HostDirection, HostIteratorMode, Key,
    Value, CF_ERROR, CRUD_ERROR, CURSOR_DESER_ERROR, CURSOR_KEY, CURSOR_SER_ERROR, METADATA_CF,
    STATE_CF, STATE_HASH_BYTES_LEN, STATE_HASH_INITIAL_BYTES, STATE_HASH_KEY,
};
use hostd_hash::HashXor;
use hostd_models::chain_cursor::{ChainCursor, ChainCursorDeserializer, ChainCursorSerializer};
use hostd_serialization::{DeserializeError, Deserializer, Serializer};
use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;

/// Wrapped RocksDB database
///
/// In our instance, we use `ChainCursor` as the ChangeID
pub type HostDB = RawHostDB<ChainCursor, ChainCursorSerializer, ChainCursorDeserializer>;

/// A generic wrapped RocksDB database.
///
/// The added features are:
/// - the change id (the consensus cursor) is persisted inside the same
///   write batch as the changes it justifies
/// - XOR state-hash tracking over the state column family
/// - fail-fast opening of an existing data directory whose structure is
///   damaged, instead of silent reinitialization
pub struct RawHostDB<
    ChangeID: PartialOrd + Ord + PartialEq + Eq + Clone + std::fmt::Debug,
    ChangeIDSerializer: Serializer<ChangeID>,
    ChangeIDDeserializer: Deserializer<ChangeID>,
> {
    /// The rocksdb instance
    pub db: Arc<DB>,
    /// configuration for the `RawHostDB`
    pub config: HostDBConfig,
    /// A serializer for the ChangeID type
    pub change_id_serializer: ChangeIDSerializer,
    /// A deserializer for the ChangeID type
    pub change_id_deserializer: ChangeIDDeserializer,
    /// The current RocksDB batch of the database, in a Mutex to share it
    pub current_batch: Arc<Mutex<WriteBatch>>,
}

impl<ChangeID, ChangeIDSerializer, ChangeIDDeserializer> std::fmt::Debug
    for RawHostDB<ChangeID, ChangeIDSerializer, ChangeIDDeserializer>
where
    ChangeID: PartialOrd + Ord + PartialEq + Eq + Clone + std::fmt::Debug,
    ChangeIDSerializer: Serializer<ChangeID>,
    ChangeIDDeserializer: Deserializer<ChangeID>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawHostDB")
            .field("db", &self.db)
            .field("config", &self.config)
            .finish()
    }
}

impl<ChangeID, ChangeIDSerializer, ChangeIDDeserializer>
    RawHostDB<ChangeID, ChangeIDSerializer, ChangeIDDeserializer>
where
    ChangeID: PartialOrd + Ord + PartialEq + Eq + Clone + std::fmt::Debug,
    ChangeIDSerializer: Serializer<ChangeID>,
    ChangeIDDeserializer: Deserializer<ChangeID>,
{
    /// Apply the given changes to the database in one durable write batch,
    /// together with the new change id if one is provided.
    pub fn write_changes(
        &mut self,
        changes: DBBatch,
        change_id: Option<ChangeID>,
    ) -> Result<(), HostDBError> {
        let handle_state = self.db.cf_handle(STATE_CF).expect(CF_ERROR);
        let handle_metadata = self.db.cf_handle(METADATA_CF).expect(CF_ERROR);

        let mut current_xor_hash = self.get_xor_db_hash();

        *self.current_batch.lock() = WriteBatch::default();

        for (key, value) in changes.iter() {
            // un-mix the previous value of the key, if any
            if let Ok(Some(prev_value)) = self.db.get_cf(handle_state, key) {
                current_xor_hash ^= HashXor::compute_from_kv(key, &prev_value);
            }
            if let Some(value) = value {
                self.current_batch.lock().put_cf(handle_state, key, value);
                current_xor_hash ^= HashXor::compute_from_kv(key, value);
            } else {
                self.current_batch.lock().delete_cf(handle_state, key);
            }
        }

        if let Some(change_id) = change_id {
            self.set_change_id_to_batch(&change_id)?;
        }

        // Update the hash entry
        self.current_batch
            .lock()
            .put_cf(handle_metadata, STATE_HASH_KEY, current_xor_hash.0);

        {
            let mut current_batch_guard = self.current_batch.lock();
            let batch = WriteBatch::from_data(current_batch_guard.data());
            current_batch_guard.clear();

            self.db.write(batch).map_err(|e| {
                HostDBError::RocksDBError(format!("Can't write batch to disk: {}", e))
            })?;
        }

        Ok(())
    }

    /// Get the current change id attached to the database.
    pub fn get_change_id(&self) -> Result<ChangeID, HostDBError> {
        let db = &self.db;
        let handle = db.cf_handle(METADATA_CF).expect(CF_ERROR);

        let Ok(Some(change_id_bytes)) = db.get_pinned_cf(handle, CURSOR_KEY) else {
            return Err(HostDBError::Corrupted(String::from(
                "could not recover the cursor record in the database",
            )));
        };

        let (_rest, change_id) = self
            .change_id_deserializer
            .deserialize::<DeserializeError>(&change_id_bytes)
            .map_err(|_| HostDBError::DeserializeError(String::from(CURSOR_DESER_ERROR)))?;

        Ok(change_id)
    }

    /// Set the initial change id. This function should only be called at
    /// fresh-database initialization, as it does not batch this set with
    /// other changes.
    fn set_initial_change_id(&self, change_id: &ChangeID) -> Result<(), HostDBError> {
        self.current_batch.lock().clear();

        self.set_change_id_to_batch(change_id)?;

        {
            let mut current_batch_guard = self.current_batch.lock();
            let batch = WriteBatch::from_data(current_batch_guard.data());
            current_batch_guard.clear();

            self.db.write(batch).map_err(|e| {
                HostDBError::RocksDBError(format!("{}: {}", CRUD_ERROR, e))
            })?;
        }
        Ok(())
    }

    /// Set the current change id in the batch
    fn set_change_id_to_batch(&self, change_id: &ChangeID) -> Result<(), HostDBError> {
        let handle_metadata = self.db.cf_handle(METADATA_CF).expect(CF_ERROR);

        let mut change_id_bytes = Vec::new();
        self.change_id_serializer
            .serialize(change_id, &mut change_id_bytes)
            .map_err(|_| HostDBError::SerializeError(String::from(CURSOR_SER_ERROR)))?;

        self.current_batch
            .lock()
            .put_cf(handle_metadata, CURSOR_KEY, &change_id_bytes);
        Ok(())
    }

    /// Get the current XOR state hash of the database
    pub fn get_xor_db_hash(&self) -> HashXor<STATE_HASH_BYTES_LEN> {
        self.get_xor_db_hash_opt()
            .unwrap_or(HashXor(*STATE_HASH_INITIAL_BYTES))
    }

    fn get_xor_db_hash_opt(&self) -> Option<HashXor<STATE_HASH_BYTES_LEN>> {
        let db = &self.db;
        let handle = db.cf_handle(METADATA_CF).expect(CF_ERROR);

        db.get_cf(handle, STATE_HASH_KEY)
            .expect(CRUD_ERROR)
            .as_deref()
            .map(|state_hash_bytes| {
                HashXor(state_hash_bytes.try_into().expect(CF_ERROR))
            })
    }
}

impl HostDB {
    /// Opens a `HostDB` over `config.path`.
    ///
    /// A fresh directory is initialized with the column families and the
    /// genesis cursor. An existing database is opened strictly: a missing
    /// column family or a missing cursor record is reported as
    /// `HostDBError::Corrupted` and must be treated as corruption by the
    /// caller, never as a fresh-start signal.
    pub fn new(config: HostDBConfig) -> Result<Self, HostDBError> {
        let mut db_opts = Options::default();
        db_opts.set_max_open_files(config.max_open_files);

        let already_exists = config.path.join("CURRENT").is_file();

        let db = if already_exists {
            DB::open_cf_descriptors(
                &db_opts,
                &config.path,
                vec![
                    ColumnFamilyDescriptor::new(STATE_CF, Options::default()),
                    ColumnFamilyDescriptor::new(METADATA_CF, Options::default()),
                ],
            )
            .map_err(|e| {
                HostDBError::Corrupted(format!(
                    "existing database at {} could not be opened with its expected structure: {}",
                    config.path.display(),
                    e
                ))
            })?
        } else {
            db_opts.create_if_missing(true);
            db_opts.create_missing_column_families(true);
            DB::open_cf_descriptors(
                &db_opts,
                &config.path,
                vec![
                    ColumnFamilyDescriptor::new(STATE_CF, Options::default()),
                    ColumnFamilyDescriptor::new(METADATA_CF, Options::default()),
                ],
            )
            .map_err(|e| HostDBError::RocksDBError(format!("{}: {}", CRUD_ERROR, e)))?
        };

        let host_db = Self {
            db: Arc::new(db),
            config,
            change_id_serializer: ChainCursorSerializer::new(),
            change_id_deserializer: ChainCursorDeserializer::new(),
            current_batch: Arc::new(Mutex::new(WriteBatch::default())),
        };

        if already_exists {
            // the cursor record must be present in an intact database
            host_db.get_change_id()?;
        } else {
            host_db.set_initial_change_id(&ChainCursor::genesis())?;
        }

        Ok(host_db)
    }
}

impl HostDBController for HostDB {
    /// Writes the batch to the DB, atomically with the new cursor if provided
    fn write_batch(
        &mut self,
        batch: DBBatch,
        cursor: Option<ChainCursor>,
    ) -> Result<(), HostDBError> {
        self.write_changes(batch, cursor)
    }

    /// Utility function to put / update a key & value in the batch
    fn put_or_update_entry_value(&self, batch: &mut DBBatch, key: Key, value: &[u8]) {
        batch.insert(key, Some(value.to_vec()));
    }

    /// Utility function to delete a key & value in the batch
    fn delete_key(&self, batch: &mut DBBatch, key: Key) {
        batch.insert(key, None);
    }

    /// Get the persisted consensus cursor
    fn get_cursor(&self) -> Result<ChainCursor, HostDBError> {
        self.get_change_id()
    }

    /// Exposes RocksDB's "get_cf" function
    fn get_cf(&self, handle_cf: &str, key: Key) -> Result<Option<Value>, HostDBError> {
        let db = &self.db;
        let handle = db.cf_handle(handle_cf).expect(CF_ERROR);
        db.get_cf(handle, key)
            .map_err(|e| HostDBError::RocksDBError(format!("{}: {}", CRUD_ERROR, e)))
    }

    /// Exposes RocksDB's "iterator_cf" function
    fn iterator_cf(
        &self,
        handle_cf: &str,
        mode: HostIteratorMode,
    ) -> Box<dyn Iterator<Item = (Key, Value)> + '_> {
        let db = &self.db;
        let handle = db.cf_handle(handle_cf).expect(CF_ERROR);

        let mode = match mode {
            HostIteratorMode::Start => IteratorMode::Start,
            HostIteratorMode::End => IteratorMode::End,
            HostIteratorMode::From(key, HostDirection::Forward) => {
                IteratorMode::From(key, Direction::Forward)
            }
            HostIteratorMode::From(key, HostDirection::Reverse) => {
                IteratorMode::From(key, Direction::Reverse)
            }
        };

        Box::new(
            db.iterator_cf(handle, mode)
                .flatten()
                .map(|(k, v)| (k.to_vec(), v.to_vec())),
        )
    }

    /// Exposes RocksDB's "prefix_iterator_cf" function
    fn prefix_iterator_cf(
        &self,
        handle_cf: &str,
        prefix: &[u8],
    ) -> Box<dyn Iterator<Item = (Key, Value)> + '_> {
        let db = &self.db;
        let handle = db.cf_handle(handle_cf).expect(CF_ERROR);
        let owned_prefix = prefix.to_vec();

        Box::new(
            db.iterator_cf(handle, IteratorMode::From(prefix, Direction::Forward))
                .flatten()
                .map(|(k, v)| (k.to_vec(), v.to_vec()))
                .take_while(move |(k, _)| k.starts_with(&owned_prefix)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostd_db_exports::STATE_CF;
    use hostd_models::block_height::BlockHeight;
    use hostd_models::block_id::BlockId;
    use hostd_hash::Hash;
    use tempfile::TempDir;

    fn cursor_at(height: u64, seed: &[u8]) -> ChainCursor {
        ChainCursor::new(BlockHeight::new(height), BlockId::new(Hash::compute_from(seed)))
    }

    #[test]
    fn test_fresh_open_sets_genesis_cursor() {
        let temp_dir = TempDir::new().unwrap();
        let db = HostDB::new(HostDBConfig {
            path: temp_dir.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(db.get_cursor().unwrap(), ChainCursor::genesis());
    }

    #[test]
    fn test_batch_and_cursor_commit_together() {
        let temp_dir = TempDir::new().unwrap();
        let mut db = HostDB::new(HostDBConfig {
            path: temp_dir.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();

        let cursor = cursor_at(7, b"tip");
        let mut batch = DBBatch::new();
        db.put_or_update_entry_value(&mut batch, b"obligation/abc".to_vec(), b"record");
        db.write_batch(batch, Some(cursor)).unwrap();

        assert_eq!(db.get_cursor().unwrap(), cursor);
        assert_eq!(
            db.get_cf(STATE_CF, b"obligation/abc".to_vec()).unwrap(),
            Some(b"record".to_vec())
        );

        // delete through a batch without touching the cursor
        let mut batch = DBBatch::new();
        db.delete_key(&mut batch, b"obligation/abc".to_vec());
        db.write_batch(batch, None).unwrap();
        assert_eq!(db.get_cursor().unwrap(), cursor);
        assert_eq!(db.get_cf(STATE_CF, b"obligation/abc".to_vec()).unwrap(), None);
    }

    #[test]
    fn test_reopen_preserves_state() {
        let temp_dir = TempDir::new().unwrap();
        let config = HostDBConfig {
            path: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        let cursor = cursor_at(42, b"persisted");
        {
            let mut db = HostDB::new(config.clone()).unwrap();
            let mut batch = DBBatch::new();
            db.put_or_update_entry_value(&mut batch, b"k".to_vec(), b"v");
            db.write_batch(batch, Some(cursor)).unwrap();
        }
        let db = HostDB::new(config).unwrap();
        assert_eq!(db.get_cursor().unwrap(), cursor);
        assert_eq!(db.get_cf(STATE_CF, b"k".to_vec()).unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_xor_hash_returns_to_initial_after_full_removal() {
        let temp_dir = TempDir::new().unwrap();
        let mut db = HostDB::new(HostDBConfig {
            path: temp_dir.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();

        let initial = db.get_xor_db_hash();
        let mut batch = DBBatch::new();
        db.put_or_update_entry_value(&mut batch, b"a".to_vec(), b"1");
        db.put_or_update_entry_value(&mut batch, b"b".to_vec(), b"2");
        db.write_batch(batch, None).unwrap();
        assert_ne!(db.get_xor_db_hash(), initial);

        let mut batch = DBBatch::new();
        db.delete_key(&mut batch, b"a".to_vec());
        db.delete_key(&mut batch, b"b".to_vec());
        db.write_batch(batch, None).unwrap();
        assert_eq!(db.get_xor_db_hash(), initial);
    }

    #[test]
    fn test_open_with_missing_column_family_fails_fast() {
        let temp_dir = TempDir::new().unwrap();
        {
            // a database that only has the state column family
            let mut db_opts = Options::default();
            db_opts.create_if_missing(true);
            db_opts.create_missing_column_families(true);
            let _db = DB::open_cf_descriptors(
                &db_opts,
                temp_dir.path(),
                vec![ColumnFamilyDescriptor::new(STATE_CF, Options::default())],
            )
            .unwrap();
        }
        let res = HostDB::new(HostDBConfig {
            path: temp_dir.path().to_path_buf(),
            ..Default::default()
        });
        assert!(matches!(res, Err(HostDBError::Corrupted(_))));
    }

    #[test]
    fn test_open_with_missing_cursor_record_fails_fast() {
        let temp_dir = TempDir::new().unwrap();
        {
            // structurally complete, but the cursor record was never written
            let mut db_opts = Options::default();
            db_opts.create_if_missing(true);
            db_opts.create_missing_column_families(true);
            let _db = DB::open_cf_descriptors(
                &db_opts,
                temp_dir.path(),
                vec![
                    ColumnFamilyDescriptor::new(STATE_CF, Options::default()),
                    ColumnFamilyDescriptor::new(METADATA_CF, Options::default()),
                ],
            )
            .unwrap();
        }
        let res = HostDB::new(HostDBConfig {
            path: temp_dir.path().to_path_buf(),
            ..Default::default()
        });
        assert!(matches!(res, Err(HostDBError::Corrupted(_))));
    }
}
