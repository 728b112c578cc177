// Copyright (c) 2022 MASSA LABS <info@massa.net>

use displaydoc::Display;
use thiserror::Error;

/// models error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum ModelsError {
    /// Serialization error: {0}
    SerializeError(String),
    /// Deserialization error: {0}
    DeserializeError(String),
    /// `ObligationId` parsing error
    ObligationIdParseError,
    /// `TransactionId` parsing error
    TransactionIdParseError,
    /// `BlockId` parsing error
    BlockIdParseError,
    /// Amount parse error: {0}
    AmountParseError(String),
    /// Checked operation error: {0}
    CheckedOperationError(String),
    /// Block height overflow error
    HeightOverflowError,
    /// Invalid merkle challenge index: {0}
    InvalidMerkleIndex(String),
}

impl From<hostd_hash::HostHashError> for ModelsError {
    fn from(err: hostd_hash::HostHashError) -> Self {
        ModelsError::DeserializeError(format!("{}", err))
    }
}

impl From<hostd_serialization::SerializeError> for ModelsError {
    fn from(err: hostd_serialization::SerializeError) -> Self {
        ModelsError::SerializeError(format!("{}", err))
    }
}
