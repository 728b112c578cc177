// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::ModelsError;
use hostd_hash::{Hash, HashDeserializer, HashSerializer, HASH_SIZE_BYTES};
use hostd_serialization::{Deserializer, SerializeError, Serializer};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::str::FromStr;

/// Size in bytes of a serialized `TransactionId`
pub const TRANSACTION_ID_SIZE_BYTES: usize = HASH_SIZE_BYTES;

const TRANSACTIONID_PREFIX: char = 'T';

/// transaction id
#[derive(
    Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct TransactionId(pub Hash);

impl TransactionId {
    /// transaction id from the hash of the transaction contents
    pub const fn new(hash: Hash) -> Self {
        TransactionId(hash)
    }

    /// underlying hash
    pub fn get_hash(&self) -> &Hash {
        &self.0
    }

    /// transaction id to bytes
    pub fn to_bytes(&self) -> &[u8; TRANSACTION_ID_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// transaction id into bytes
    pub fn into_bytes(self) -> [u8; TRANSACTION_ID_SIZE_BYTES] {
        self.0.into_bytes()
    }

    /// transaction id from bytes
    pub fn from_bytes(data: &[u8; TRANSACTION_ID_SIZE_BYTES]) -> TransactionId {
        TransactionId(Hash::from_bytes(data))
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", TRANSACTIONID_PREFIX, self.0.to_bs58_check())
    }
}

impl std::fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for TransactionId {
    type Err = ModelsError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match chars.next() {
            Some(prefix) if prefix == TRANSACTIONID_PREFIX => {
                let data = chars.collect::<String>();
                Ok(TransactionId(
                    Hash::from_bs58_check(&data)
                        .map_err(|_| ModelsError::TransactionIdParseError)?,
                ))
            }
            _ => Err(ModelsError::TransactionIdParseError),
        }
    }
}

/// Serializer for `TransactionId`
#[derive(Default, Clone)]
pub struct TransactionIdSerializer {
    hash_serializer: HashSerializer,
}

impl TransactionIdSerializer {
    /// Creates a new serializer for `TransactionId`
    pub const fn new() -> Self {
        Self {
            hash_serializer: HashSerializer::new(),
        }
    }
}

impl Serializer<TransactionId> for TransactionIdSerializer {
    fn serialize(&self, value: &TransactionId, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.hash_serializer.serialize(&value.0, buffer)
    }
}

/// Deserializer for `TransactionId`
#[derive(Default, Clone)]
pub struct TransactionIdDeserializer {
    hash_deserializer: HashDeserializer,
}

impl TransactionIdDeserializer {
    /// Creates a new deserializer for `TransactionId`
    pub const fn new() -> Self {
        Self {
            hash_deserializer: HashDeserializer::new(),
        }
    }
}

impl Deserializer<TransactionId> for TransactionIdDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], TransactionId, E> {
        context("Failed TransactionId deserialization", |input| {
            let (rest, hash) = self.hash_deserializer.deserialize(input)?;
            Ok((rest, TransactionId(hash)))
        })(buffer)
    }
}
