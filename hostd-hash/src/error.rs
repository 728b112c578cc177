// Copyright (c) 2022 MASSA LABS <info@massa.net>

use displaydoc::Display;
use thiserror::Error;

/// hash error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum HostHashError {
    /// parsing error: {0}
    ParsingError(String),
}
