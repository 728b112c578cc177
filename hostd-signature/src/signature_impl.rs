// Copyright (c) 2022 MASSA LABS <info@massa.net>

use crate::error::HostSignatureError;
use ed25519_dalek::{Signer, Verifier};
use hostd_hash::Hash;
use hostd_serialization::{Deserializer, SerializeError, Serializer};
use nom::{
    bytes::complete::take,
    error::{context, ContextError, ParseError},
    IResult,
};
use rand::rngs::OsRng;
use std::{convert::TryInto, str::FromStr};

/// Size of a public key, in bytes
pub const PUBLIC_KEY_SIZE_BYTES: usize = 32;
/// Size of a secret key, in bytes
pub const SECRET_KEY_SIZE_BYTES: usize = 32;
/// Size of a signature, in bytes
pub const SIGNATURE_SIZE_BYTES: usize = 64;

const SECRET_KEY_PREFIX: char = 'S';
const PUBLIC_KEY_PREFIX: char = 'P';

/// An ed25519 keypair
#[derive(Clone)]
pub struct KeyPair(ed25519_dalek::SigningKey);

impl std::fmt::Display for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            SECRET_KEY_PREFIX,
            bs58::encode(self.0.to_bytes()).with_check().into_string()
        )
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl KeyPair {
    /// Generates a new random keypair.
    ///
    /// # Example
    /// ```
    /// # use hostd_signature::KeyPair;
    /// let keypair = KeyPair::generate();
    /// ```
    pub fn generate() -> Self {
        KeyPair(ed25519_dalek::SigningKey::generate(&mut OsRng))
    }

    /// Signs a previously computed message hash.
    ///
    /// # Example
    /// ```
    /// # use hostd_signature::KeyPair;
    /// # use hostd_hash::Hash;
    /// let keypair = KeyPair::generate();
    /// let hash = Hash::compute_from(b"contract terms");
    /// let signature = keypair.sign(&hash);
    /// ```
    pub fn sign(&self, hash: &Hash) -> Signature {
        Signature(self.0.sign(hash.to_bytes()))
    }

    /// Returns the public key of this keypair.
    pub fn get_public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Returns the raw bytes of the secret key.
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Rebuilds a keypair from raw secret-key bytes.
    pub fn from_bytes(data: &[u8; SECRET_KEY_SIZE_BYTES]) -> Self {
        KeyPair(ed25519_dalek::SigningKey::from_bytes(data))
    }
}

impl FromStr for KeyPair {
    type Err = HostSignatureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match chars.next() {
            Some(prefix) if prefix == SECRET_KEY_PREFIX => {
                let data = chars.collect::<String>();
                let decoded = bs58::decode(data)
                    .with_check(None)
                    .into_vec()
                    .map_err(|err| HostSignatureError::ParsingError(format!("{}", err)))?;
                let bytes: [u8; SECRET_KEY_SIZE_BYTES] = decoded
                    .as_slice()
                    .try_into()
                    .map_err(|_| {
                        HostSignatureError::ParsingError("invalid secret key length".to_string())
                    })?;
                Ok(KeyPair::from_bytes(&bytes))
            }
            _ => Err(HostSignatureError::ParsingError(
                "invalid secret key prefix".to_string(),
            )),
        }
    }
}

/// An ed25519 public key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(ed25519_dalek::VerifyingKey);

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bytes().hash(state);
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.as_bytes().cmp(other.0.as_bytes())
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            PUBLIC_KEY_PREFIX,
            bs58::encode(self.0.to_bytes()).with_check().into_string()
        )
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl PublicKey {
    /// Checks that `signature` is a valid signature of `hash` by this key.
    ///
    /// # Example
    /// ```
    /// # use hostd_signature::KeyPair;
    /// # use hostd_hash::Hash;
    /// let keypair = KeyPair::generate();
    /// let hash = Hash::compute_from(b"contract terms");
    /// let signature = keypair.sign(&hash);
    /// assert!(keypair
    ///     .get_public_key()
    ///     .verify_signature(&hash, &signature)
    ///     .is_ok());
    /// ```
    pub fn verify_signature(
        &self,
        hash: &Hash,
        signature: &Signature,
    ) -> Result<(), HostSignatureError> {
        self.0
            .verify(hash.to_bytes(), &signature.0)
            .map_err(|err| HostSignatureError::SignatureError(format!("{}", err)))
    }

    /// Returns the raw bytes of the public key.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Rebuilds a public key from raw bytes.
    pub fn from_bytes(data: &[u8; PUBLIC_KEY_SIZE_BYTES]) -> Result<Self, HostSignatureError> {
        ed25519_dalek::VerifyingKey::from_bytes(data)
            .map(PublicKey)
            .map_err(|err| HostSignatureError::ParsingError(format!("{}", err)))
    }
}

impl FromStr for PublicKey {
    type Err = HostSignatureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match chars.next() {
            Some(prefix) if prefix == PUBLIC_KEY_PREFIX => {
                let data = chars.collect::<String>();
                let decoded = bs58::decode(data)
                    .with_check(None)
                    .into_vec()
                    .map_err(|err| HostSignatureError::ParsingError(format!("{}", err)))?;
                let bytes: [u8; PUBLIC_KEY_SIZE_BYTES] = decoded
                    .as_slice()
                    .try_into()
                    .map_err(|_| {
                        HostSignatureError::ParsingError("invalid public key length".to_string())
                    })?;
                PublicKey::from_bytes(&bytes)
            }
            _ => Err(HostSignatureError::ParsingError(
                "invalid public key prefix".to_string(),
            )),
        }
    }
}

impl ::serde::Serialize for PublicKey {
    fn serialize<S: ::serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.collect_str(self)
        } else {
            s.serialize_bytes(&self.to_bytes())
        }
    }
}

impl<'de> ::serde::Deserialize<'de> for PublicKey {
    fn deserialize<D: ::serde::Deserializer<'de>>(d: D) -> Result<PublicKey, D::Error> {
        if d.is_human_readable() {
            struct StrVisitor;
            impl<'de> ::serde::de::Visitor<'de> for StrVisitor {
                type Value = PublicKey;
                fn expecting(&self, formatter: &mut ::std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("an ASCII base58check public key string")
                }
                fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    PublicKey::from_str(v).map_err(E::custom)
                }
            }
            d.deserialize_str(StrVisitor)
        } else {
            struct BytesVisitor;
            impl<'de> ::serde::de::Visitor<'de> for BytesVisitor {
                type Value = PublicKey;
                fn expecting(&self, formatter: &mut ::std::fmt::Formatter) -> std::fmt::Result {
                    formatter.write_str("a public key bytestring")
                }
                fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
                where
                    E: ::serde::de::Error,
                {
                    let bytes: &[u8; PUBLIC_KEY_SIZE_BYTES] = v.try_into().map_err(E::custom)?;
                    PublicKey::from_bytes(bytes).map_err(E::custom)
                }
            }
            d.deserialize_bytes(BytesVisitor)
        }
    }
}

/// An ed25519 signature
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            bs58::encode(self.to_bytes()).with_check().into_string()
        )
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Signature {
    /// Returns the raw bytes of the signature.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE_BYTES] {
        self.0.to_bytes()
    }

    /// Rebuilds a signature from raw bytes.
    pub fn from_bytes(data: &[u8; SIGNATURE_SIZE_BYTES]) -> Self {
        Signature(ed25519_dalek::Signature::from_bytes(data))
    }
}

impl FromStr for Signature {
    type Err = HostSignatureError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|err| HostSignatureError::ParsingError(format!("{}", err)))?;
        let bytes: [u8; SIGNATURE_SIZE_BYTES] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| HostSignatureError::ParsingError("invalid signature length".to_string()))?;
        Ok(Signature::from_bytes(&bytes))
    }
}

/// Serializer for `PublicKey`
#[derive(Default, Clone)]
pub struct PublicKeySerializer;

impl PublicKeySerializer {
    /// Creates a serializer for `PublicKey`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<PublicKey> for PublicKeySerializer {
    fn serialize(&self, value: &PublicKey, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend(value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `PublicKey`
#[derive(Default, Clone)]
pub struct PublicKeyDeserializer;

impl PublicKeyDeserializer {
    /// Creates a deserializer for `PublicKey`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<PublicKey> for PublicKeyDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], PublicKey, E> {
        context("Failed public key deserialization", |input: &'a [u8]| {
            let (rest, key_bytes) = take(PUBLIC_KEY_SIZE_BYTES)(input)?;
            let key = PublicKey::from_bytes(key_bytes.try_into().map_err(|_| {
                nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::LengthValue,
                ))
            })?)
            .map_err(|_| {
                nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::Verify,
                ))
            })?;
            Ok((rest, key))
        })(buffer)
    }
}

/// Serializer for `Signature`
#[derive(Default, Clone)]
pub struct SignatureSerializer;

impl SignatureSerializer {
    /// Creates a serializer for `Signature`
    pub const fn new() -> Self {
        Self
    }
}

impl Serializer<Signature> for SignatureSerializer {
    fn serialize(&self, value: &Signature, buffer: &mut Vec<u8>) -> Result<(), SerializeError> {
        buffer.extend(value.to_bytes());
        Ok(())
    }
}

/// Deserializer for `Signature`
#[derive(Default, Clone)]
pub struct SignatureDeserializer;

impl SignatureDeserializer {
    /// Creates a deserializer for `Signature`
    pub const fn new() -> Self {
        Self
    }
}

impl Deserializer<Signature> for SignatureDeserializer {
    fn deserialize<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        &self,
        buffer: &'a [u8],
    ) -> IResult<&'a [u8], Signature, E> {
        context("Failed signature deserialization", |input: &'a [u8]| {
            let (rest, sig_bytes) = take(SIGNATURE_SIZE_BYTES)(input)?;
            let signature = Signature::from_bytes(sig_bytes.try_into().map_err(|_| {
                nom::Err::Error(ParseError::from_error_kind(
                    input,
                    nom::error::ErrorKind::LengthValue,
                ))
            })?);
            Ok((rest, signature))
        })(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostd_serialization::DeserializeError;

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let hash = Hash::compute_from(b"some contract terms");
        let signature = keypair.sign(&hash);
        assert!(keypair
            .get_public_key()
            .verify_signature(&hash, &signature)
            .is_ok());

        let other_hash = Hash::compute_from(b"tampered terms");
        assert!(keypair
            .get_public_key()
            .verify_signature(&other_hash, &signature)
            .is_err());
    }

    #[test]
    fn test_public_key_text_round_trip() {
        let keypair = KeyPair::generate();
        let public_key = keypair.get_public_key();
        let text = public_key.to_string();
        assert_eq!(PublicKey::from_str(&text).unwrap(), public_key);
    }

    #[test]
    fn test_signature_serialization_round_trip() {
        let keypair = KeyPair::generate();
        let hash = Hash::compute_from(b"payload");
        let signature = keypair.sign(&hash);

        let mut buffer = Vec::new();
        SignatureSerializer::new()
            .serialize(&signature, &mut buffer)
            .unwrap();
        let (rest, deserialized) = SignatureDeserializer::new()
            .deserialize::<DeserializeError>(&buffer)
            .unwrap();
        assert!(rest.is_empty());
        assert_eq!(deserialized, signature);
    }
}
