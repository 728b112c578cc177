// Copyright (c) 2022 MASSA LABS <info@massa.net>

//! Module to interact with the obligation records of the disk store.

use hostd_db_exports::{
    DBBatch, ShareableHostDBController, ARCHIVE_PREFIX, EXPIRY_INDEX_PREFIX, OBLIGATION_PREFIX,
    STATE_CF,
};
use hostd_models::block_height::{BlockHeight, HEIGHT_KEY_SIZE};
use hostd_models::chain_cursor::ChainCursor;
use hostd_models::obligation_id::{ObligationId, OBLIGATION_ID_SIZE_BYTES};
use hostd_obligation_exports::{
    ObligationConfig, ObligationError, ObligationResult, StorageObligation,
    StorageObligationDeserializer, StorageObligationSerializer,
};
use hostd_serialization::{DeserializeError, Deserializer, Serializer};

/// Key of an active obligation record
fn obligation_key(id: &ObligationId) -> Vec<u8> {
    [OBLIGATION_PREFIX.as_bytes(), &id.to_bytes()[..]].concat()
}

/// Key of an archived obligation record
fn archive_key(id: &ObligationId) -> Vec<u8> {
    [ARCHIVE_PREFIX.as_bytes(), &id.to_bytes()[..]].concat()
}

/// Key of the expiry index entry of an obligation: ordered by expiration
/// height so range scans iterate obligations in expiration order.
fn expiry_key(expiration: BlockHeight, id: &ObligationId) -> Vec<u8> {
    [
        EXPIRY_INDEX_PREFIX.as_bytes(),
        &expiration.to_bytes_key()[..],
        &id.to_bytes()[..],
    ]
    .concat()
}

/// Domain layer over the shared transactional store: composes obligation
/// record and index updates into `DBBatch`es and commits them, optionally
/// together with a cursor advance.
pub(crate) struct ObligationDB {
    db: ShareableHostDBController,
    obligation_serializer: StorageObligationSerializer,
    obligation_deserializer: StorageObligationDeserializer,
}

impl ObligationDB {
    /// Creates an `ObligationDB` over the shared store.
    pub fn new(db: ShareableHostDBController, config: &ObligationConfig) -> Self {
        Self {
            db,
            obligation_serializer: StorageObligationSerializer::new(),
            obligation_deserializer: StorageObligationDeserializer::new(
                config.max_revisions,
                config.max_sector_roots,
            ),
        }
    }

    /// Adds an obligation record (and its expiry index entry) to a batch.
    pub fn put_obligation(
        &self,
        obligation: &StorageObligation,
        batch: &mut DBBatch,
    ) -> ObligationResult<()> {
        let mut bytes = Vec::new();
        self.obligation_serializer
            .serialize(obligation, &mut bytes)
            .map_err(|err| {
                ObligationError::ValidationError(format!("cannot serialize obligation: {}", err))
            })?;
        let db = self.db.read();
        db.put_or_update_entry_value(batch, obligation_key(&obligation.id), &bytes);
        db.put_or_update_entry_value(
            batch,
            expiry_key(obligation.expiration_height, &obligation.id),
            b"",
        );
        Ok(())
    }

    /// Moves an obligation from the active set to the archive records,
    /// dropping its expiry index entry, all inside the given batch.
    pub fn archive_obligation(
        &self,
        obligation: &StorageObligation,
        batch: &mut DBBatch,
    ) -> ObligationResult<()> {
        let mut bytes = Vec::new();
        self.obligation_serializer
            .serialize(obligation, &mut bytes)
            .map_err(|err| {
                ObligationError::ValidationError(format!("cannot serialize obligation: {}", err))
            })?;
        let db = self.db.read();
        db.delete_key(batch, obligation_key(&obligation.id));
        db.delete_key(batch, expiry_key(obligation.expiration_height, &obligation.id));
        db.put_or_update_entry_value(batch, archive_key(&obligation.id), &bytes);
        Ok(())
    }

    /// Commits a batch, atomically with the new cursor if one is provided.
    pub fn write_batch(&self, batch: DBBatch, cursor: Option<ChainCursor>) -> ObligationResult<()> {
        self.db.write().write_batch(batch, cursor)?;
        Ok(())
    }

    /// Reads an obligation from the active set. Returns `None` for an
    /// unknown identifier.
    pub fn get_obligation(&self, id: &ObligationId) -> ObligationResult<Option<StorageObligation>> {
        let serialized = self.db.read().get_cf(STATE_CF, obligation_key(id))?;
        match serialized {
            Some(bytes) => Ok(Some(self.deserialize_obligation(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads an obligation from the archive records.
    pub fn get_archived_obligation(
        &self,
        id: &ObligationId,
    ) -> ObligationResult<Option<StorageObligation>> {
        let serialized = self.db.read().get_cf(STATE_CF, archive_key(id))?;
        match serialized {
            Some(bytes) => Ok(Some(self.deserialize_obligation(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The persisted cursor of the last fully processed consensus change.
    pub fn get_cursor(&self) -> ObligationResult<ChainCursor> {
        Ok(self.db.read().get_cursor()?)
    }

    /// Replays every active obligation, for registry population.
    pub fn iter_obligations(&self) -> ObligationResult<Vec<StorageObligation>> {
        let db = self.db.read();
        let mut obligations = Vec::new();
        for (_key, bytes) in db.prefix_iterator_cf(STATE_CF, OBLIGATION_PREFIX.as_bytes()) {
            obligations.push(self.deserialize_obligation(&bytes)?);
        }
        Ok(obligations)
    }

    /// Identifiers of active obligations whose expiration height is at
    /// most `bound`, in expiration order (the expiry index scan).
    pub fn ids_expiring_through(&self, bound: BlockHeight) -> ObligationResult<Vec<ObligationId>> {
        let db = self.db.read();
        let prefix_len = EXPIRY_INDEX_PREFIX.len();
        let mut ids = Vec::new();
        for (key, _) in db.prefix_iterator_cf(STATE_CF, EXPIRY_INDEX_PREFIX.as_bytes()) {
            let Some(height_bytes) = key
                .get(prefix_len..prefix_len + HEIGHT_KEY_SIZE)
                .and_then(|b| <&[u8; HEIGHT_KEY_SIZE]>::try_from(b).ok())
            else {
                return Err(ObligationError::PersistenceError(
                    hostd_db_exports::HostDBError::Corrupted(
                        "malformed expiry index key".to_string(),
                    ),
                ));
            };
            if BlockHeight::from_bytes_key(height_bytes) > bound {
                // keys are sorted by expiration height, nothing further matches
                break;
            }
            let Some(id_bytes) = key
                .get(prefix_len + HEIGHT_KEY_SIZE..)
                .and_then(|b| <&[u8; OBLIGATION_ID_SIZE_BYTES]>::try_from(b).ok())
            else {
                return Err(ObligationError::PersistenceError(
                    hostd_db_exports::HostDBError::Corrupted(
                        "malformed expiry index key".to_string(),
                    ),
                ));
            };
            ids.push(ObligationId::from_bytes(id_bytes));
        }
        Ok(ids)
    }

    fn deserialize_obligation(&self, bytes: &[u8]) -> ObligationResult<StorageObligation> {
        let (rest, obligation) = self
            .obligation_deserializer
            .deserialize::<DeserializeError>(bytes)
            .map_err(|err| {
                ObligationError::PersistenceError(hostd_db_exports::HostDBError::Corrupted(
                    format!("stored obligation cannot be deserialized: {}", err),
                ))
            })?;
        if !rest.is_empty() {
            return Err(ObligationError::PersistenceError(
                hostd_db_exports::HostDBError::Corrupted(
                    "stored obligation record has trailing bytes".to_string(),
                ),
            ));
        }
        Ok(obligation)
    }
}
