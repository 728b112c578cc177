// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::ModelsError;
use hostd_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use serde::{Deserialize, Serialize};
use std::ops::Bound;
use std::str::FromStr;

/// Size in bytes of the sortable key form of a height
pub const HEIGHT_KEY_SIZE: usize = 8;

/// A position in the blockchain, counted in blocks from genesis
#[derive(
    Debug, Clone, Copy, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockHeight(pub u64);

impl std::fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlockHeight {
    type Err = ModelsError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(BlockHeight(s.parse::<u64>().map_err(|_| {
            ModelsError::DeserializeError("invalid block height".to_string())
        })?))
    }
}

impl BlockHeight {
    /// new height from a block count
    pub const fn new(height: u64) -> Self {
        BlockHeight(height)
    }

    /// the genesis height
    pub const fn min() -> Self {
        BlockHeight(0)
    }

    /// the maximal representable height
    pub const fn max() -> Self {
        BlockHeight(u64::MAX)
    }

    /// Returns the next height
    pub fn checked_next(&self) -> Result<Self, ModelsError> {
        self.checked_add(1)
    }

    /// Adds a number of blocks, erroring on overflow
    pub fn checked_add(&self, blocks: u64) -> Result<Self, ModelsError> {
        self.0
            .checked_add(blocks)
            .map(BlockHeight)
            .ok_or(ModelsError::HeightOverflowError)
    }

    /// Adds a number of blocks, saturating on overflow
    #[must_use]
    pub fn saturating_add(&self, blocks: u64) -> Self {
        BlockHeight(self.0.saturating_add(blocks))
    }

    /// Subtracts a number of blocks, saturating at genesis
    #[must_use]
    pub fn saturating_sub(&self, blocks: u64) -> Self {
        BlockHeight(self.0.saturating_sub(blocks))
    }

    /// Returns a fixed-size sortable binary key: iterating the key form in
    /// lexicographic order iterates heights in ascending order.
    ///
    /// ## Example
    /// ```rust
    /// # use hostd_models::block_height::BlockHeight;
    /// let height = BlockHeight::new(42);
    /// let key = height.to_bytes_key();
    /// let res = BlockHeight::from_bytes_key(&key);
    /// assert_eq!(height, res);
    /// ```
    pub fn to_bytes_key(&self) -> [u8; HEIGHT_KEY_SIZE] {
        self.0.to_be_bytes()
    }

    /// Deserializes a height from its fixed-size sortable binary key form
    pub fn from_bytes_key(buffer: &[u8; HEIGHT_KEY_SIZE]) -> Self {
        BlockHeight(u64::from_be_bytes(*buffer))
    }
}

/// Serializer for `BlockHeight`
#[derive(Clone, Default)]
pub struct BlockHeightSerializer {
    u64_serializer: U64VarIntSerializer,
}

impl BlockHeightSerializer {
    /// Creates a serializer for `BlockHeight`
    pub const fn new() -> Self {
        Self {
            u64_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<BlockHeight> for BlockHeightSerializer {
    fn serialize(&self, value: &BlockHeight, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.u64_serializer.serialize(&value.0, buffer)
    }
}

/// Deserializer for `BlockHeight`
#[derive(Clone)]
pub struct BlockHeightDeserializer {
    u64_deserializer: U64VarIntDeserializer,
}

impl BlockHeightDeserializer {
    /// Creates a deserializer for `BlockHeight` accepting heights in the given bounds
    pub const fn new(min: Bound<u64>, max: Bound<u64>) -> Self {
        Self {
            u64_deserializer: U64VarIntDeserializer::new(min, max),
        }
    }
}

impl Default for BlockHeightDeserializer {
    fn default() -> Self {
        Self::new(Bound::Included(u64::MIN), Bound::Included(u64::MAX))
    }
}

impl Deserializer<BlockHeight> for BlockHeightDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], BlockHeight, E> {
        context("Failed BlockHeight deserialization", |input| {
            let (rest, height) = self.u64_deserializer.deserialize(input)?;
            Ok((rest, BlockHeight(height)))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostd_serialization::DeserializeError;

    #[test]
    fn test_key_form_orders_like_heights() {
        let low = BlockHeight::new(255);
        let high = BlockHeight::new(256);
        assert!(low.to_bytes_key() < high.to_bytes_key());
    }

    #[test]
    fn test_serialization_round_trip() {
        let serializer = BlockHeightSerializer::new();
        let deserializer = BlockHeightDeserializer::default();
        for height in [BlockHeight::min(), BlockHeight::new(1_000_000), BlockHeight::max()] {
            let mut buffer = Vec::new();
            serializer.serialize(&height, &mut buffer).unwrap();
            let (rest, deserialized) = deserializer
                .deserialize::<DeserializeError>(&buffer)
                .unwrap();
            assert_eq!(deserialized, height);
            assert!(rest.is_empty());
        }
    }
}
