// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Binary serialization traits and varint helpers shared by every crate
//! of the workspace. Serialization is explicit and versionable: each type
//! has a dedicated `Serializer` / `Deserializer` pair instead of a serde
//! derive, and deserializers carry the bounds the value must respect.

#![warn(missing_docs)]

use displaydoc::Display;
use nom::error::{ContextError, ErrorKind, ParseError};
use nom::IResult;
use std::fmt::Display as FmtDisplay;
use std::marker::PhantomData;
use std::ops::{Bound, RangeBounds};
use thiserror::Error;

/// serialization error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum SerializeError {
    /// Number {0} is too big to be serialized
    NumberTooBig(String),
    /// General error {0}
    GeneralError(String),
}

/// Error accumulator used when deserializing with full context chains.
/// The default error type to instantiate `Deserializer::deserialize` with.
#[derive(Debug)]
pub struct DeserializeError<'a> {
    errors: Vec<(&'a [u8], ErrorKind)>,
    contexts: Vec<(&'a [u8], &'static str)>,
}

impl<'a> ParseError<&'a [u8]> for DeserializeError<'a> {
    fn from_error_kind(input: &'a [u8], kind: ErrorKind) -> Self {
        DeserializeError {
            errors: vec![(input, kind)],
            contexts: Vec::new(),
        }
    }

    fn append(input: &'a [u8], kind: ErrorKind, mut other: Self) -> Self {
        other.errors.push((input, kind));
        other
    }
}

impl<'a> ContextError<&'a [u8]> for DeserializeError<'a> {
    fn add_context(input: &'a [u8], ctx: &'static str, mut other: Self) -> Self {
        other.contexts.push((input, ctx));
        other
    }
}

impl<'a> FmtDisplay for DeserializeError<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (_, ctx) in self.contexts.iter().rev() {
            writeln!(f, "in {}:", ctx)?;
        }
        if let Some((input, kind)) = self.errors.first() {
            write!(
                f,
                "{:?} at buffer of length {}",
                kind,
                input.len()
            )?;
        }
        Ok(())
    }
}

/// Trait for serializing a value of type `T` into a byte buffer.
pub trait Serializer<T> {
    /// Serialize `value` by appending its byte form to `buffer`.
    fn serialize(&self, value: &T, buffer: &mut Vec<u8>) -> Result<(), SerializeError>;
}

/// Trait for deserializing a value of type `T` from a byte buffer,
/// returning the unconsumed rest of the buffer.
pub trait Deserializer<T> {
    /// Deserialize a `T` from the start of `buffer`.
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], T, E>;
}

/// Serializer for `u64` using variable-length encoding
#[derive(Clone, Default)]
pub struct U64VarIntSerializer;

impl U64VarIntSerializer {
    /// Creates a new `U64VarIntSerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<u64> for U64VarIntSerializer {
    fn serialize(&self, value: &u64, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let mut varint_buffer = unsigned_varint::encode::u64_buffer();
        buffer.extend_from_slice(unsigned_varint::encode::u64(*value, &mut varint_buffer));
        Ok(())
    }
}

/// Deserializer for `u64` using variable-length encoding, bounded to a range
#[derive(Clone)]
pub struct U64VarIntDeserializer {
    range: (Bound<u64>, Bound<u64>),
}

impl U64VarIntDeserializer {
    /// Creates a new `U64VarIntDeserializer` accepting only values inside the given bounds
    pub const fn new(min: Bound<u64>, max: Bound<u64>) -> Self {
        Self { range: (min, max) }
    }
}

impl Deserializer<u64> for U64VarIntDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], u64, E> {
        nom::error::context("Failed u64 deserialization", |input: &'a [u8]| {
            let (value, rest) = unsigned_varint::decode::u64(input)
                .map_err(|_| nom::Err::Error(E::from_error_kind(input, ErrorKind::Fail)))?;
            if !self.range.contains(&value) {
                return Err(nom::Err::Error(E::from_error_kind(
                    input,
                    ErrorKind::Verify,
                )));
            }
            Ok((rest, value))
        })(buffer)
    }
}

/// Serializer for `u32` using variable-length encoding
#[derive(Clone, Default)]
pub struct U32VarIntSerializer;

impl U32VarIntSerializer {
    /// Creates a new `U32VarIntSerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<u32> for U32VarIntSerializer {
    fn serialize(&self, value: &u32, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        let mut varint_buffer = unsigned_varint::encode::u32_buffer();
        buffer.extend_from_slice(unsigned_varint::encode::u32(*value, &mut varint_buffer));
        Ok(())
    }
}

/// Deserializer for `u32` using variable-length encoding, bounded to a range
#[derive(Clone)]
pub struct U32VarIntDeserializer {
    range: (Bound<u32>, Bound<u32>),
}

impl U32VarIntDeserializer {
    /// Creates a new `U32VarIntDeserializer` accepting only values inside the given bounds
    pub const fn new(min: Bound<u32>, max: Bound<u32>) -> Self {
        Self { range: (min, max) }
    }
}

impl Deserializer<u32> for U32VarIntDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], u32, E> {
        nom::error::context("Failed u32 deserialization", |input: &'a [u8]| {
            let (value, rest) = unsigned_varint::decode::u32(input)
                .map_err(|_| nom::Err::Error(E::from_error_kind(input, ErrorKind::Fail)))?;
            if !self.range.contains(&value) {
                return Err(nom::Err::Error(E::from_error_kind(
                    input,
                    ErrorKind::Verify,
                )));
            }
            Ok((rest, value))
        })(buffer)
    }
}

const OPTION_NONE_FLAG: u8 = 0u8;
const OPTION_SOME_FLAG: u8 = 1u8;

/// Serializer for `Option<T>`: a one-byte presence flag followed by the
/// inner serialization when present.
#[derive(Clone)]
pub struct OptionSerializer<T, ST>
where
    ST: Serializer<T>,
{
    data_serializer: ST,
    phantom_t: PhantomData<T>,
}

impl<T, ST> OptionSerializer<T, ST>
where
    ST: Serializer<T>,
{
    /// Creates an `OptionSerializer` from the serializer of the inner type
    pub fn new(data_serializer: ST) -> Self {
        OptionSerializer {
            data_serializer,
            phantom_t: PhantomData,
        }
    }
}

impl<T, ST> Serializer<Option<T>> for OptionSerializer<T, ST>
where
    ST: Serializer<T>,
{
    fn serialize(&self, opt_value: &Option<T>, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        match opt_value {
            Some(value) => {
                buffer.push(OPTION_SOME_FLAG);
                self.data_serializer.serialize(value, buffer)
            }
            None => {
                buffer.push(OPTION_NONE_FLAG);
                Ok(())
            }
        }
    }
}

/// Deserializer for `Option<T>`
#[derive(Clone)]
pub struct OptionDeserializer<T, DT>
where
    DT: Deserializer<T>,
{
    data_deserializer: DT,
    phantom_t: PhantomData<T>,
}

impl<T, DT> OptionDeserializer<T, DT>
where
    DT: Deserializer<T>,
{
    /// Creates an `OptionDeserializer` from the deserializer of the inner type
    pub fn new(data_deserializer: DT) -> Self {
        OptionDeserializer {
            data_deserializer,
            phantom_t: PhantomData,
        }
    }
}

impl<T, DT> Deserializer<Option<T>> for OptionDeserializer<T, DT>
where
    DT: Deserializer<T>,
{
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Option<T>, E> {
        nom::error::context("Failed Option<_> deserialization", |input: &'a [u8]| {
            match input.first() {
                Some(&OPTION_NONE_FLAG) => Ok((&input[1..], None)),
                Some(&OPTION_SOME_FLAG) => {
                    let (rest, value) = self.data_deserializer.deserialize(&input[1..])?;
                    Ok((rest, Some(value)))
                }
                _ => Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Tag))),
            }
        })(buffer)
    }
}

/// Serializer for `bool`: a single byte, `0` or `1`.
#[derive(Clone, Default)]
pub struct BoolSerializer;

impl BoolSerializer {
    /// Creates a new `BoolSerializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<bool> for BoolSerializer {
    fn serialize(&self, value: &bool, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.push(u8::from(*value));
        Ok(())
    }
}

/// Deserializer for `bool`
#[derive(Clone, Default)]
pub struct BoolDeserializer;

impl BoolDeserializer {
    /// Creates a new `BoolDeserializer`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<bool> for BoolDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], bool, E> {
        nom::error::context("Failed bool deserialization", |input: &'a [u8]| match input
            .first()
        {
            Some(&0u8) => Ok((&input[1..], false)),
            Some(&1u8) => Ok((&input[1..], true)),
            _ => Err(nom::Err::Error(E::from_error_kind(input, ErrorKind::Tag))),
        })(buffer)
    }
}
