// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Signature management for co-signed storage contracts.

#![warn(missing_docs)]
mod error;
mod signature_impl;

pub use error::HostSignatureError;
pub use signature_impl::{
    KeyPair, PublicKey, PublicKeyDeserializer, PublicKeySerializer, Signature,
    SignatureDeserializer, SignatureSerializer, PUBLIC_KEY_SIZE_BYTES, SIGNATURE_SIZE_BYTES,
};
