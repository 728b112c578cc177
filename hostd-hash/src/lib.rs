// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! Hash primitive used for content identifiers, merkle nodes and the
//! whole-store integrity hash.

#![warn(missing_docs)]
pub use error::HostHashError;
pub use hash::{Hash, HashDeserializer, HashSerializer};
pub use hash_xor::HashXor;
pub use settings::HASH_SIZE_BYTES;

mod error;
mod hash;
mod hash_xor;
mod settings;
