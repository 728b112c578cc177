// Copyright (c) 2022 MASSA LABS <info@massa.net>

use displaydoc::Display;
use thiserror::Error;

/// database error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum HostDBError {
    /// rocksdb error: {0}
    RocksDBError(String),
    /// serialize error: {0}
    SerializeError(String),
    /// deserialize error: {0}
    DeserializeError(String),
    /// structural corruption detected: {0}
    Corrupted(String),
}
