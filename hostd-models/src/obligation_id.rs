// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::ModelsError;
use hostd_hash::{Hash, HashDeserializer, HashSerializer, HASH_SIZE_BYTES};
use hostd_serialization::{Deserializer, SerializeError, Serializer};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::str::FromStr;

/// Size in bytes of a serialized `ObligationId`
pub const OBLIGATION_ID_SIZE_BYTES: usize = HASH_SIZE_BYTES;

const OBLIGATIONID_PREFIX: char = 'O';

/// Identifier of a storage obligation: the hash of its formation terms.
/// Globally unique and immutable once assigned.
#[derive(
    Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct ObligationId(pub Hash);

impl ObligationId {
    /// obligation id from the hash of the formation terms
    pub const fn new(hash: Hash) -> Self {
        ObligationId(hash)
    }

    /// underlying hash
    pub fn get_hash(&self) -> &Hash {
        &self.0
    }

    /// obligation id to bytes
    pub fn to_bytes(&self) -> &[u8; OBLIGATION_ID_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// obligation id into bytes
    pub fn into_bytes(self) -> [u8; OBLIGATION_ID_SIZE_BYTES] {
        self.0.into_bytes()
    }

    /// obligation id from bytes
    pub fn from_bytes(data: &[u8; OBLIGATION_ID_SIZE_BYTES]) -> ObligationId {
        ObligationId(Hash::from_bytes(data))
    }
}

impl std::fmt::Display for ObligationId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", OBLIGATIONID_PREFIX, self.0.to_bs58_check())
    }
}

impl std::fmt::Debug for ObligationId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for ObligationId {
    type Err = ModelsError;
    /// ## Example
    /// ```rust
    /// # use hostd_hash::Hash;
    /// # use std::str::FromStr;
    /// # use hostd_models::obligation_id::ObligationId;
    /// # let id = ObligationId::new(Hash::compute_from(b"test"));
    /// let ser = id.to_string();
    /// let res_id = ObligationId::from_str(&ser).unwrap();
    /// assert_eq!(id, res_id);
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match chars.next() {
            Some(prefix) if prefix == OBLIGATIONID_PREFIX => {
                let data = chars.collect::<String>();
                Ok(ObligationId(
                    Hash::from_bs58_check(&data)
                        .map_err(|_| ModelsError::ObligationIdParseError)?,
                ))
            }
            _ => Err(ModelsError::ObligationIdParseError),
        }
    }
}

/// Serializer for `ObligationId`
#[derive(Default, Clone)]
pub struct ObligationIdSerializer {
    hash_serializer: HashSerializer,
}

impl ObligationIdSerializer {
    /// Creates a new serializer for `ObligationId`
    pub const fn new() -> Self {
        Self {
            hash_serializer: HashSerializer::new(),
        }
    }
}

impl Serializer<ObligationId> for ObligationIdSerializer {
    fn serialize(&self, value: &ObligationId, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.hash_serializer.serialize(&value.0, buffer)
    }
}

/// Deserializer for `ObligationId`
#[derive(Default, Clone)]
pub struct ObligationIdDeserializer {
    hash_deserializer: HashDeserializer,
}

impl ObligationIdDeserializer {
    /// Creates a new deserializer for `ObligationId`
    pub const fn new() -> Self {
        Self {
            hash_deserializer: HashDeserializer::new(),
        }
    }
}

impl Deserializer<ObligationId> for ObligationIdDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], ObligationId, E> {
        context("Failed ObligationId deserialization", |input| {
            let (rest, hash) = self.hash_deserializer.deserialize(input)?;
            Ok((rest, ObligationId(hash)))
        })(buffer)
    }
}
