// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::block_height::{BlockHeight, BlockHeightDeserializer, BlockHeightSerializer};
use crate::block_id::{BlockId, BlockIdDeserializer, BlockIdSerializer};
use hostd_hash::Hash;
use hostd_serialization::{Deserializer, SerializeError, Serializer};
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The persisted token identifying the last blockchain change fully
/// applied by the consensus change processor. Advances on block apply,
/// retreats on revert; updated in the same durable transaction as the
/// obligation mutations it caused, so it is the exact resumption point
/// after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainCursor {
    /// height of the chain tip this cursor points at
    pub height: BlockHeight,
    /// id of the chain tip block
    pub block: BlockId,
}

impl PartialOrd for ChainCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChainCursor {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.height, self.block).cmp(&(other.height, other.block))
    }
}

impl std::fmt::Display for ChainCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "(height: {}, block: {})", self.height, self.block)
    }
}

impl ChainCursor {
    /// new cursor from a tip height and block
    pub const fn new(height: BlockHeight, block: BlockId) -> Self {
        ChainCursor { height, block }
    }

    /// The cursor value before any consensus change was processed.
    pub fn genesis() -> Self {
        ChainCursor {
            height: BlockHeight::min(),
            block: BlockId::new(Hash::compute_from(b"")),
        }
    }
}

/// Serializer for `ChainCursor`
#[derive(Clone, Default)]
pub struct ChainCursorSerializer {
    height_serializer: BlockHeightSerializer,
    block_id_serializer: BlockIdSerializer,
}

impl ChainCursorSerializer {
    /// Creates a serializer for `ChainCursor`
    pub const fn new() -> Self {
        Self {
            height_serializer: BlockHeightSerializer::new(),
            block_id_serializer: BlockIdSerializer::new(),
        }
    }
}

impl Serializer<ChainCursor> for ChainCursorSerializer {
    fn serialize(&self, value: &ChainCursor, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        self.height_serializer.serialize(&value.height, buffer)?;
        self.block_id_serializer.serialize(&value.block, buffer)
    }
}

/// Deserializer for `ChainCursor`
#[derive(Clone)]
pub struct ChainCursorDeserializer {
    height_deserializer: BlockHeightDeserializer,
    block_id_deserializer: BlockIdDeserializer,
}

impl ChainCursorDeserializer {
    /// Creates a deserializer for `ChainCursor`
    pub fn new() -> Self {
        Self {
            height_deserializer: BlockHeightDeserializer::default(),
            block_id_deserializer: BlockIdDeserializer::new(),
        }
    }
}

impl Default for ChainCursorDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer<ChainCursor> for ChainCursorDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], ChainCursor, E> {
        context("Failed ChainCursor deserialization", |input| {
            let (rest, height) = self.height_deserializer.deserialize(input)?;
            let (rest, block) = self.block_id_deserializer.deserialize(rest)?;
            Ok((rest, ChainCursor { height, block }))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostd_serialization::DeserializeError;

    #[test]
    fn test_cursor_round_trip() {
        let cursor = ChainCursor::new(
            BlockHeight::new(1234),
            BlockId::new(Hash::compute_from(b"tip")),
        );
        let mut buffer = Vec::new();
        ChainCursorSerializer::new()
            .serialize(&cursor, &mut buffer)
            .unwrap();
        let (rest, deserialized) = ChainCursorDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(deserialized, cursor);
    }

    #[test]
    fn test_cursor_order_is_height_first() {
        let a = ChainCursor::new(
            BlockHeight::new(10),
            BlockId::new(Hash::compute_from(b"zzz")),
        );
        let b = ChainCursor::new(
            BlockHeight::new(11),
            BlockId::new(Hash::compute_from(b"aaa")),
        );
        assert!(a < b);
    }
}
