// Copyright (c) 2022 MASSA LABS <info@massa.net>

use std::collections::BTreeMap;

/// Key type of the database
pub type Key = Vec<u8>;
/// Value type of the database
pub type Value = Vec<u8>;

/// Batch of changes to apply to the database in one durable transaction:
/// `Some(value)` is a put, `None` a delete.
pub type DBBatch = BTreeMap<Key, Option<Value>>;
