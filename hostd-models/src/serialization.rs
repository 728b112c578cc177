// Copyright (c) 2022 MASSA LABS <info@massa.net>

use hostd_serialization::{
    Deserializer, SerializeError, Serializer, U64VarIntDeserializer, U64VarIntSerializer,
};
use nom::bytes::complete::take;
use nom::error::{context, ContextError, ParseError};
use nom::IResult;
use std::ops::Bound;

/// Serializer for `Vec<u8>`: a varint length followed by the raw bytes
#[derive(Clone, Default)]
pub struct VecU8Serializer {
    len_serializer: U64VarIntSerializer,
}

impl VecU8Serializer {
    /// Creates a serializer for `Vec<u8>`
    pub const fn new() -> Self {
        Self {
            len_serializer: U64VarIntSerializer::new(),
        }
    }
}

impl Serializer<Vec<u8>> for VecU8Serializer {
    fn serialize(&self, value: &Vec<u8>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let len: u64 = value.len().try_into().map_err(|err| {
            SerializeError::NumberTooBig(format!("too many bytes in Vec<u8>: {}", err))
        })?;
        self.len_serializer.serialize(&len, buffer)?;
        buffer.extend(value);
        Ok(())
    }
}

/// Deserializer for `Vec<u8>`
#[derive(Clone)]
pub struct VecU8Deserializer {
    len_deserializer: U64VarIntDeserializer,
}

impl VecU8Deserializer {
    /// Creates a deserializer for `Vec<u8>` with bounds on the byte count
    pub const fn new(min_length: Bound<u64>, max_length: Bound<u64>) -> Self {
        Self {
            len_deserializer: U64VarIntDeserializer::new(min_length, max_length),
        }
    }
}

impl Default for VecU8Deserializer {
    fn default() -> Self {
        Self::new(Bound::Included(u64::MIN), Bound::Included(u64::MAX))
    }
}

impl Deserializer<Vec<u8>> for VecU8Deserializer {
    /// ## Example
    /// ```rust
    /// use hostd_models::serialization::{VecU8Deserializer, VecU8Serializer};
    /// use hostd_serialization::{Serializer, Deserializer, DeserializeError};
    ///
    /// let vec = vec![1u8, 2, 3];
    /// let mut buffer = Vec::new();
    /// VecU8Serializer::new().serialize(&vec, &mut buffer).unwrap();
    /// let (rest, res) = VecU8Deserializer::default().deserialize::<DeserializeError>(&buffer).unwrap();
    /// assert!(rest.is_empty());
    /// assert_eq!(res, vec);
    /// ```
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Vec<u8>, E> {
        context("Failed Vec<u8> deserialization", |input| {
            let (rest, len) = self.len_deserializer.deserialize(input)?;
            let (rest, data) = take(len as usize)(rest)?;
            Ok((rest, data.to_vec()))
        })(buffer)
    }
}
