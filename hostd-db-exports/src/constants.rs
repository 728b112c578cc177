// Copyright (c) 2022 MASSA LABS <info@massa.net>

// Commons
pub const METADATA_CF: &str = "metadata";
pub const STATE_CF: &str = "state";

// Hash
pub const STATE_HASH_BYTES_LEN: usize = 32;
pub const STATE_HASH_KEY: &[u8; 1] = b"h";
pub const STATE_HASH_INITIAL_BYTES: &[u8; STATE_HASH_BYTES_LEN] = &[0; STATE_HASH_BYTES_LEN];

// Cursor
pub const CURSOR_KEY: &[u8; 1] = b"c";
pub const CURSOR_DESER_ERROR: &str = "critical: cursor deserialization failed";
pub const CURSOR_SER_ERROR: &str = "critical: cursor serialization failed";

// Errors
pub const CF_ERROR: &str = "critical: rocksdb column family operation failed";
pub const OPEN_ERROR: &str = "critical: rocksdb open operation failed";
pub const CRUD_ERROR: &str = "critical: rocksdb crud operation failed";
pub const STATE_HASH_ERROR: &str = "critical: saved state hash is corrupted";

// Prefixes
pub const OBLIGATION_PREFIX: &str = "obligation/";
pub const EXPIRY_INDEX_PREFIX: &str = "expiry/";
pub const ARCHIVE_PREFIX: &str = "archive/";

// Obligations
pub const OBLIGATION_DESER_ERROR: &str = "critical: obligation deserialization failed";
pub const OBLIGATION_SER_ERROR: &str = "critical: obligation serialization failed";
pub const OBLIGATION_ID_DESER_ERROR: &str = "critical: obligation id deserialization failed";
