// Copyright (c) 2022 MASSA LABS <info@massa.net>

use std::path::PathBuf;

/// Config structure for a `RawHostDB`
#[derive(Debug, Clone)]
pub struct HostDBConfig {
    /// The path to the database, used in the wrapped RocksDB instance
    pub path: PathBuf,
    /// Maximum number of RocksDB open files
    pub max_open_files: i32,
}

impl Default for HostDBConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            max_open_files: 820,
        }
    }
}
