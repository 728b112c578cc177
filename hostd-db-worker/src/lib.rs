// Copyright (c) 2022 MASSA LABS <info@massa.net>
//! RocksDB implementation of the durable transactional store. The
//! consensus cursor travels inside the same `WriteBatch` as the data it
//! justifies, which is what makes crash recovery exact.

mod host_db;

pub use host_db::{HostDB, RawHostDB};
